// flarm-core/src/install/launch.rs
use std::path::Path;
use std::process::{Child, Command};

use flarm_common::error::{FlarmError, Result};
use tracing::debug;

use super::shortcut::find_launch_target;

/// Starts the installed program, with its own directory as the working
/// directory.
pub fn launch_installed(install_dir: &Path, short_name: &str) -> Result<Child> {
    let target = find_launch_target(install_dir, short_name).ok_or_else(|| {
        FlarmError::NotFound(format!(
            "No executable for '{}' in {}",
            short_name,
            install_dir.display()
        ))
    })?;
    let workdir = target.parent().unwrap_or(install_dir);

    debug!(
        "Launching {} (cwd {})",
        target.display(),
        workdir.display()
    );
    Command::new(&target)
        .current_dir(workdir)
        .spawn()
        .map_err(|e| FlarmError::from_io(e, format!("Failed to launch {}", target.display())))
}
