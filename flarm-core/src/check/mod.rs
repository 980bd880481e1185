pub mod installed;

pub use installed::{find_exact, find_loose, list_installed, InstalledPackage};
