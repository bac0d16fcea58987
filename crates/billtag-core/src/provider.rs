//! Provider trait for resource inventories
//!
//! This module defines the `ResourceProvider` trait that inventory crates
//! implement. The engine only ever asks a provider which resource ids are
//! live; it never writes anything back.

use crate::error::Result;
use crate::types::{OwnerTag, ProductionFlag, ResourceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Tag key carrying the owner on live resources
pub const OWNER_TAG_KEY: &str = "KEEP";

/// Tag key carrying the production flag on live resources
pub const PRODUCTION_TAG_KEY: &str = "PROD";

/// Kind of cloud resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Instance,
    Volume,
    Snapshot,
    Image,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Instance => write!(f, "instance"),
            ResourceKind::Volume => write!(f, "volume"),
            ResourceKind::Snapshot => write!(f, "snapshot"),
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::Other => write!(f, "other"),
        }
    }
}

/// A live resource as reported by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier, matching the billing export's `ResourceId`
    pub id: ResourceId,
    /// Resource kind
    pub kind: ResourceKind,
    /// Region the resource lives in
    pub region: String,
    /// Tags as stored on the resource
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Creation time, when known
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Kind-specific fields, used only for display
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    /// Resources this one is attached to or built from, e.g. a volume's
    /// instance or an image's snapshots
    #[serde(default)]
    pub linked: Vec<ResourceId>,
}

impl Resource {
    fn tag(&self, key: &str) -> Option<&str> {
        let prefixed = format!("user:{key}");
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key) || k.eq_ignore_ascii_case(&prefixed))
            .map(|(_, v)| v.as_str())
    }

    /// Canonical owner tag of the resource
    pub fn owner_tag(&self) -> OwnerTag {
        OwnerTag::new(self.tag(OWNER_TAG_KEY).unwrap_or_default())
    }

    /// Canonical production flag of the resource
    pub fn production_flag(&self) -> ProductionFlag {
        ProductionFlag::new(self.tag(PRODUCTION_TAG_KEY).unwrap_or_default())
    }
}

/// Owner tags of the resources linked to each listed resource
///
/// Links count in both directions: a snapshot picks up the owners of the
/// images that reference it, and a volume the owner of its instance. Links
/// to resources missing from `resources` are ignored.
pub fn linked_owner_tags(resources: &[Resource]) -> HashMap<ResourceId, BTreeSet<OwnerTag>> {
    let by_id: HashMap<&ResourceId, &Resource> = resources.iter().map(|r| (&r.id, r)).collect();

    let mut linked: HashMap<ResourceId, BTreeSet<OwnerTag>> = HashMap::new();
    for resource in resources {
        for target in resource.linked.iter().filter_map(|id| by_id.get(id)) {
            linked
                .entry(resource.id.clone())
                .or_default()
                .insert(target.owner_tag());
            linked
                .entry(target.id.clone())
                .or_default()
                .insert(resource.owner_tag());
        }
    }
    linked
}

/// Trait for resource inventories.
///
/// Implementations may be backed by a cloud API or by an offline dump; the
/// engine treats both the same way.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Regions this provider can list.
    async fn regions(&self) -> Result<Vec<String>>;

    /// List all resources in one region.
    async fn list_resources(&self, region: &str) -> Result<Vec<Resource>>;
}

/// List every resource across all regions, skipping regions that fail
pub async fn list_all_resources(provider: &dyn ResourceProvider) -> Vec<Resource> {
    let regions = match provider.regions().await {
        Ok(regions) => regions,
        Err(e) => {
            warn!("Could not list regions, continuing without inventory: {}", e);
            return Vec::new();
        }
    };

    let listings = join_all(regions.iter().map(|region| provider.list_resources(region))).await;

    let mut resources = Vec::new();
    for (region, listing) in regions.iter().zip(listings) {
        match listing {
            Ok(found) => {
                debug!("Region {} lists {} resources", region, found.len());
                resources.extend(found);
            }
            Err(e) => warn!("Could not list resources in {}: {}", region, e),
        }
    }
    resources
}

/// Ids of every live resource the provider knows about
///
/// Provider failures are recovered as an empty (or partial) set so a report
/// can still be produced without live-status annotation.
pub async fn collect_live_resource_ids(provider: &dyn ResourceProvider) -> HashSet<ResourceId> {
    list_all_resources(provider)
        .await
        .into_iter()
        .map(|resource| resource.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BilltagError;

    struct FakeProvider {
        fail_regions: bool,
    }

    fn resource(id: &str, region: &str) -> Resource {
        Resource {
            id: ResourceId::new(id),
            kind: ResourceKind::Instance,
            region: region.to_string(),
            tags: BTreeMap::new(),
            created_at: None,
            details: BTreeMap::new(),
            linked: Vec::new(),
        }
    }

    #[async_trait]
    impl ResourceProvider for FakeProvider {
        async fn regions(&self) -> Result<Vec<String>> {
            if self.fail_regions {
                return Err(BilltagError::Provider("access denied".into()));
            }
            Ok(vec!["us-east-1".into(), "eu-west-1".into()])
        }

        async fn list_resources(&self, region: &str) -> Result<Vec<Resource>> {
            match region {
                "us-east-1" => Ok(vec![resource("i-1", region), resource("vol-2", region)]),
                _ => Err(BilltagError::Provider(format!("{region} unavailable"))),
            }
        }
    }

    #[tokio::test]
    async fn test_failing_region_is_skipped() {
        let ids = collect_live_resource_ids(&FakeProvider {
            fail_regions: false,
        })
        .await;
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&ResourceId::new("i-1")));
    }

    #[tokio::test]
    async fn test_region_failure_recovers_as_empty() {
        let ids = collect_live_resource_ids(&FakeProvider { fail_regions: true }).await;
        assert!(ids.is_empty());
    }

    #[test]
    fn test_resource_tags_are_canonical() {
        let mut r = resource("i-1", "us-east-1");
        r.tags.insert("keep".into(), "alice".into());
        r.tags.insert("user:PROD".into(), "Yes".into());
        assert_eq!(r.owner_tag().as_str(), "ALICE");
        assert!(r.production_flag().is_production());
    }

    #[test]
    fn test_linked_owner_tags_follow_links_both_ways() {
        let mut instance = resource("i-1", "us-east-1");
        instance.tags.insert("KEEP".into(), "alice".into());
        let mut volume = resource("vol-1", "us-east-1");
        volume.kind = ResourceKind::Volume;
        volume.linked.push(ResourceId::new("i-1"));
        let mut image = resource("ami-1", "us-east-1");
        image.kind = ResourceKind::Image;
        image.tags.insert("KEEP".into(), "bob".into());
        image.linked = vec![ResourceId::new("snap-1"), ResourceId::new("snap-gone")];
        let mut snapshot = resource("snap-1", "us-east-1");
        snapshot.kind = ResourceKind::Snapshot;

        let linked = linked_owner_tags(&[instance, volume, image, snapshot]);

        let owners = |id: &str| -> Vec<String> {
            linked[&ResourceId::new(id)].iter().map(|o| o.label().to_string()).collect()
        };
        assert_eq!(owners("vol-1"), vec!["ALICE"]);
        assert_eq!(owners("i-1"), vec!["untagged"]);
        assert_eq!(owners("snap-1"), vec!["BOB"]);
        assert_eq!(owners("ami-1"), vec!["untagged"]);
        assert!(!linked.contains_key(&ResourceId::new("snap-gone")));
    }

    #[test]
    fn test_unknown_kind_deserializes_as_other() {
        let kind: ResourceKind = serde_json::from_str("\"bucket\"").unwrap();
        assert_eq!(kind, ResourceKind::Other);
    }
}
