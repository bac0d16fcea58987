//! Offline resource inventory for billtag
//!
//! This crate implements the provider trait on top of a JSON dump of live
//! resources, so the live-status cross-check can run without cloud
//! credentials.

pub mod inventory;

pub use inventory::InventoryProvider;
