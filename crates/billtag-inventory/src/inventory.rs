//! Inventory file provider
//!
//! Reads a resource dump of the form
//!
//! ```json
//! {
//!   "resources": [
//!     {"id": "i-0abc", "kind": "instance", "region": "us-east-1",
//!      "tags": {"KEEP": "alice", "PROD": "yes"},
//!      "created_at": "2024-06-01T00:00:00Z",
//!      "details": {"instance_type": "t2.micro"}}
//!   ]
//! }
//! ```
//!
//! The file location comes from the caller or from `BILLTAG_INVENTORY_PATH`,
//! falling back to `<data dir>/billtag/inventory.json`.

use async_trait::async_trait;
use billtag_core::error::{BilltagError, Result};
use billtag_core::provider::{Resource, ResourceProvider};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the inventory location
pub const INVENTORY_PATH_ENV: &str = "BILLTAG_INVENTORY_PATH";

#[derive(Deserialize)]
struct InventoryFile {
    #[serde(default)]
    resources: Vec<Resource>,
}

/// Resource provider backed by an inventory JSON file.
pub struct InventoryProvider {
    path: PathBuf,
    resources: Vec<Resource>,
}

impl InventoryProvider {
    /// Load the inventory from the configured default location
    pub async fn new() -> Result<Self> {
        let path = if let Ok(path) = std::env::var(INVENTORY_PATH_ENV) {
            PathBuf::from(path)
        } else {
            dirs::data_dir()
                .ok_or_else(|| BilltagError::Config("Cannot determine data directory".into()))?
                .join("billtag")
                .join("inventory.json")
        };
        Self::from_path(path).await
    }

    /// Load the inventory from an explicit file
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            BilltagError::Provider(format!("cannot read inventory {}: {e}", path.display()))
        })?;
        let file: InventoryFile = serde_json::from_str(&content).map_err(|e| {
            BilltagError::Provider(format!("invalid inventory {}: {e}", path.display()))
        })?;

        debug!(
            "Loaded {} resources from inventory {}",
            file.resources.len(),
            path.display()
        );
        Ok(Self {
            path,
            resources: file.resources,
        })
    }

    /// Location the inventory was read from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResourceProvider for InventoryProvider {
    async fn regions(&self) -> Result<Vec<String>> {
        let regions: BTreeSet<&str> = self.resources.iter().map(|r| r.region.as_str()).collect();
        Ok(regions.into_iter().map(String::from).collect())
    }

    async fn list_resources(&self, region: &str) -> Result<Vec<Resource>> {
        Ok(self
            .resources
            .iter()
            .filter(|r| r.region == region)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billtag_core::provider::{ResourceKind, collect_live_resource_ids};
    use billtag_core::types::ResourceId;
    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    // Serializes tests that touch BILLTAG_INVENTORY_PATH
    static ENV_MUTEX: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

    const INVENTORY: &str = r#"{
        "resources": [
            {"id": "i-1", "kind": "instance", "region": "us-east-1",
             "tags": {"KEEP": "alice", "PROD": "yes"}},
            {"id": "vol-1", "kind": "volume", "region": "us-east-1",
             "details": {"size_gb": "100"}, "linked": ["i-1"]},
            {"id": "snap-9", "kind": "snapshot", "region": "eu-west-1",
             "created_at": "2024-05-30T08:00:00Z"}
        ]
    }"#;

    async fn write_inventory(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("inventory.json");
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_lists_resources_per_region() {
        let dir = TempDir::new().unwrap();
        let provider = InventoryProvider::from_path(write_inventory(&dir, INVENTORY).await)
            .await
            .unwrap();

        assert_eq!(
            provider.regions().await.unwrap(),
            vec!["eu-west-1".to_string(), "us-east-1".to_string()]
        );

        let east = provider.list_resources("us-east-1").await.unwrap();
        assert_eq!(east.len(), 2);
        assert_eq!(east[0].kind, ResourceKind::Instance);
        assert_eq!(east[0].owner_tag().as_str(), "ALICE");
        assert_eq!(east[1].linked, vec![ResourceId::new("i-1")]);
        assert!(provider.list_resources("ap-south-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_ids_from_inventory() {
        let dir = TempDir::new().unwrap();
        let provider = InventoryProvider::from_path(write_inventory(&dir, INVENTORY).await)
            .await
            .unwrap();

        let ids = collect_live_resource_ids(&provider).await;
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&ResourceId::new("snap-9")));
    }

    #[tokio::test]
    async fn test_invalid_inventory_is_provider_error() {
        let dir = TempDir::new().unwrap();
        let path = write_inventory(&dir, "{not json").await;
        let err = InventoryProvider::from_path(path).await.err().unwrap();
        assert!(matches!(err, BilltagError::Provider(_)));
    }

    #[tokio::test]
    async fn test_env_override() {
        let _guard = ENV_MUTEX.lock().await;
        let dir = TempDir::new().unwrap();
        let path = write_inventory(&dir, INVENTORY).await;

        // Note: env::set_var is unsafe in Rust 2024 due to thread-safety concerns
        unsafe {
            std::env::set_var(INVENTORY_PATH_ENV, &path);
        }
        let provider = InventoryProvider::new().await;
        unsafe {
            std::env::remove_var(INVENTORY_PATH_ENV);
        }

        assert_eq!(provider.unwrap().path(), path.as_path());
    }
}
