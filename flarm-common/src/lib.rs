// flarm-common/src/lib.rs
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod remote;

// Re-export key types
pub use config::Config;
pub use error::{FlarmError, Result};
pub use model::{InstallRequest, Manifest, PackageIdentity, PlatformTag, ReleaseAsset};
pub use remote::{RemoteRepository, RemoteStream};
