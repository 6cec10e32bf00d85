//! Deployment engine.
//!
//! This module contains:
//! - Resolver: logical-id mapping and substitution
//! - Publisher: create-or-update of bundle artifacts
//! - Precondition: empty-workspace check
//! - Plan: stages and retry policy
//! - Controller: staged, retrying deployment
//! - Verify: post-deployment checks
//! - Folders: moving deployed artifacts into folders

pub mod controller;
pub mod folders;
pub mod plan;
pub mod precondition;
pub mod publisher;
pub mod resolver;
pub mod suggestions;
pub mod verify;

// Re-export commonly used types
pub use controller::{
    AttemptRecord, CancelToken, ControllerState, DeploymentOutcome, StagedDeploymentController,
};
pub use folders::{FolderOrganizer, MovedItem};
pub use plan::{RetryPolicy, Stage, StagePlan};
pub use precondition::{PreconditionOutcome, PreconditionValidator};
pub use publisher::{
    ArtifactPublisher, BundlePublisher, PublishRequest, PublishSummary, PublishedItem, Publisher,
};
pub use resolver::{LogicalIdMap, LogicalIdResolver, Substitution, SubstitutionMode};
pub use suggestions::{format_suggestions, suggestions_for};
pub use verify::{AccessCheck, DeploymentVerifier, ExpectedArtifact, ItemAccess, VerificationReport};
