// flarm-core/src/install/mod.rs
pub mod extract;
pub mod launch;
pub mod mover;
pub mod shortcut;

pub use extract::{detect_archive_kind, extract_archive, ArchiveKind};
pub use launch::launch_installed;
pub use mover::move_install_tree;
pub use shortcut::{create_shortcut, find_executable, find_launch_target, sanitize_shortcut_name};
