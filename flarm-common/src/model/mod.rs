// flarm-common/src/model/mod.rs
pub mod asset;
pub mod identity;
pub mod manifest;
pub mod platform;
pub mod request;

pub use asset::{AssetSelection, ReleaseAsset};
pub use identity::{PackageIdentity, PLACEHOLDER_VALUE};
pub use manifest::{Manifest, ManifestField};
pub use platform::{PlatformAliases, PlatformTag};
pub use request::InstallRequest;
