//! Domain types for the deployment engine.
//!
//! This module contains the core data structures:
//! - Descriptor: author-time metadata for one artifact
//! - Definition: descriptor plus payload parts read from a bundle
//! - Remote: artifacts and folders as listed by the remote workspace
//! - Session: per-session precondition state

pub mod definition;
pub mod descriptor;
pub mod remote;
pub mod session;

// Re-export commonly used types
pub use definition::{ArtifactDefinition, DefinitionPart, PartKind};
pub use descriptor::{ArtifactDescriptor, DESCRIPTOR_FILE_NAME, SENTINEL_LOGICAL_ID};
pub use remote::{RemoteArtifact, RemoteFolder, SelfArtifact, SelfPolicy};
pub use session::DeploymentSession;
