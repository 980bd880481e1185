// flarm-core/src/lib.rs

pub mod asset;
pub mod check;
pub mod install;
pub mod manifest;
pub mod pipeline;
pub mod platform;
pub mod uninstall;

// Re-export key types for the CLI crate
pub use asset::{select_best_asset, AssetPattern};
pub use check::installed::{list_installed, InstalledPackage};
pub use install::launch::launch_installed;
pub use manifest::parse_manifest;
pub use pipeline::{
    locate_installation, start_install_worker, start_uninstall_worker, InstallOutcome,
    LocatedInstall, Reporter,
};
pub use platform::{check_compatibility, current_platform_tag};
