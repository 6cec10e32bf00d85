//! Extracted bundle access.
//!
//! - Store: discovery of descriptors and reading of artifact definitions
//! - Repair: replacement of sentinel logical ids before upload

pub mod repair;
pub mod store;

pub use repair::{DegenerateIdRepairer, RepairReport};
pub use store::{find_descriptor_files, BundleItem, DefinitionStore};
