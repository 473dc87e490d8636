//! Stevedore Release Support
//!
//! Everything a release job needs before its first task runs: the release
//! job extension that prepares the release directory, and the artifact
//! retrieval orchestrator that downloads every declared artifact into it.
//!
//! ## Main Types
//!
//! - [`ReleaseJobExtension`]: job extension for release host types
//! - [`ArtifactRetrievalOrchestrator`]: fetch, filter, clean and download
//! - [`ArtifactExtensionRegistry`]: artifact type tag to download strategy
//! - [`FileShareArtifactExtension`]: copies artifacts from a shared folder

pub mod backend;
pub mod directory;
pub mod extension;
pub mod filter;
pub mod fileshare;
pub mod fs;
pub mod orchestrator;
pub mod registry;

pub use backend::StaticArtifactBackend;
pub use directory::{ReleaseDirectoryManager, ReleaseDirectoryMapping};
pub use extension::ReleaseJobExtension;
pub use filter::filter_artifacts;
pub use fileshare::{FileShareArtifactExtension, FileShareDetails, FILE_SHARE_ARTIFACT_TYPE};
pub use fs::LocalFileSystemManager;
pub use orchestrator::ArtifactRetrievalOrchestrator;
pub use registry::ArtifactExtensionRegistry;
