//! # Stevedore Interfaces
//!
//! Collaborator traits consumed by the execution engine. Implementations
//! live in `stevedore-execution` and `stevedore-release`; tests substitute
//! their own.
//!
//! ## Main Interfaces
//!
//! - [`DefinitionLoader`] - Resolve a task instance to its static definition
//! - [`HandlerFactory`] and [`Handler`] - Build and run a task's handler
//! - [`JobExtension`] - Host-type specific job setup and path rooting
//! - [`ArtifactExtension`] - Download strategy for one artifact type
//! - [`ArtifactBackend`] - Source of a release's declared artifacts
//! - [`FileSystemManager`] - Folder lifecycle operations

pub mod execution;
pub mod extension;
pub mod release;

// Re-export commonly used types
pub use execution::{DefinitionLoader, Handler, HandlerFactory, HandlerSpec};
pub use extension::JobExtension;
pub use release::{ArtifactBackend, ArtifactExtension, FileSystemManager};
