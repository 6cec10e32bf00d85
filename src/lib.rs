//! fabdeploy - Staged deployment of artifact bundles into remote workspaces
//!
//! A bundle is a directory tree with one artifact per directory. Each
//! artifact carries a `.platform` descriptor (display name, type, and an
//! author-time logical id) next to its definition files.
//!
//! # Deployment
//!
//! - Degenerate (all-zero) logical ids are repaired before upload
//! - Artifacts are created, or found if they already exist, then their
//!   definitions are uploaded with logical ids rewritten to workspace ids
//! - Stages of artifact types run in the declared order; a failed stage is
//!   retried, and after the first failure the empty-workspace check is
//!   bypassed for the rest of the session
//!
//! # Modules
//!
//! - `adapters`: Remote workspace API (trait plus REST client)
//! - `bundle`: Bundle reading and logical-id repair
//! - `core`: Resolver, publisher, precondition, plan, controller, verify,
//!   folders
//! - `domain`: Descriptors, definitions, remote items, session state
//! - `config`: YAML configuration with environment overlays
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Deploy storage before compute
//! fabdeploy -w <workspace-id> deploy --stage Lakehouse,Eventhouse --stage Notebook
//!
//! # Preview logical-id repairs
//! fabdeploy fix-ids --dry-run
//!
//! # Check what was deployed
//! fabdeploy verify --expect "Sales:Lakehouse"
//!
//! # File an item into a folder
//! fabdeploy move-item Notebook "Load Orders" Analysis
//! ```

pub mod adapters;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use adapters::{FabricClient, WorkspaceApi};
pub use bundle::{DefinitionStore, DegenerateIdRepairer, RepairReport};
pub use core::{
    BundlePublisher, CancelToken, DeploymentOutcome, LogicalIdMap, LogicalIdResolver,
    PreconditionValidator, RetryPolicy, StagePlan, StagedDeploymentController,
};
pub use domain::{ArtifactDescriptor, DeploymentSession};
pub use error::{DeployError, Result};
