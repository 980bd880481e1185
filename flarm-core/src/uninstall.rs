// flarm-core/src/uninstall.rs

use std::path::Path;
use std::{fs, io};

use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::pipeline::PipelineEvent;
use tracing::{debug, error, warn};

use crate::install::shortcut::shortcut_paths;
use crate::pipeline::Reporter;

/// Removes a filesystem artifact (file, symlink or directory).
///
/// Returns `true` if the artifact is removed or was already gone, `false`
/// otherwise.
pub(crate) fn remove_filesystem_artifact(path: &Path) -> bool {
    match path.symlink_metadata() {
        Ok(metadata) => {
            let file_type = metadata.file_type();
            // Symlinks to directories are removed with remove_file.
            let is_real_dir = file_type.is_dir();

            debug!(
                "Removing filesystem artifact ({}) at: {}",
                if is_real_dir {
                    "directory"
                } else if file_type.is_symlink() {
                    "symlink"
                } else {
                    "file"
                },
                path.display()
            );

            let removed = if is_real_dir {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };

            match removed {
                Ok(()) => {
                    debug!("Successfully removed artifact: {}", path.display());
                    true
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Artifact {} already removed.", path.display());
                    true
                }
                Err(e) => {
                    error!("Failed to remove artifact {}: {}", path.display(), e);
                    false
                }
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Artifact not found (already removed?): {}", path.display());
            true
        }
        Err(e) => {
            warn!(
                "Failed to get metadata for artifact {}: {}",
                path.display(),
                e
            );
            false
        }
    }
}

/// Removes an installation: its launchers first, each on a best-effort
/// basis, then the install record itself.
///
/// Failing to delete the install record is an error; a leftover launcher
/// is only reported.
pub fn uninstall_package(
    install_dir: &Path,
    display_name: &str,
    config: &Config,
    reporter: &Reporter,
) -> Result<()> {
    reporter.send(PipelineEvent::UninstallStarted {
        path: install_dir.to_path_buf(),
    });

    if !display_name.trim().is_empty() {
        for shortcut in shortcut_paths(&config.desktop_dir, display_name) {
            if shortcut.symlink_metadata().is_err() {
                continue;
            }
            if remove_filesystem_artifact(&shortcut) {
                reporter.send(PipelineEvent::ShortcutRemoved { path: shortcut });
            } else {
                reporter.warn(format!(
                    "Could not remove shortcut {}; delete it manually",
                    shortcut.display()
                ));
            }
        }
    }

    if install_dir.symlink_metadata().is_err() {
        reporter.warn(format!(
            "Install directory {} is already gone",
            install_dir.display()
        ));
        return Ok(());
    }

    fs::remove_dir_all(install_dir).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => FlarmError::PermissionDenied(format!(
            "Cannot remove {}: {}",
            install_dir.display(),
            e
        )),
        _ => FlarmError::UninstallError(format!(
            "Failed to remove {}: {}",
            install_dir.display(),
            e
        )),
    })?;
    reporter.info(format!("Removed {}", install_dir.display()));
    Ok(())
}
