// flarm-core/src/install/mover.rs
use std::fs;
use std::path::{Path, PathBuf};

use flarm_common::error::{FlarmError, Result};
use fs_extra::dir::CopyOptions;
use tracing::{debug, warn};

/// Moves every top-level entry of `source` into `target`, replacing
/// whatever already sits at the same name.
///
/// Entries are moved one at a time; if a later entry fails, earlier ones
/// have already been moved.
pub fn move_install_tree(source: &Path, target: &Path) -> Result<PathBuf> {
    fs::create_dir_all(target).map_err(|e| {
        FlarmError::from_io(e, format!("Failed to create install dir {}", target.display()))
    })?;

    let entries = fs::read_dir(source).map_err(|e| {
        FlarmError::from_io(e, format!("Failed to read staging dir {}", source.display()))
    })?;
    let mut names: Vec<_> = entries
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<_>>()
        .map_err(|e| {
            FlarmError::from_io(e, format!("Failed to list staging dir {}", source.display()))
        })?;
    names.sort();

    for name in names {
        let from = source.join(&name);
        let to = target.join(&name);

        clear_existing(&to)?;
        move_entry(&from, &to)?;
        debug!("Moved {} -> {}", from.display(), to.display());
    }

    Ok(target.to_path_buf())
}

/// Removes whatever sits at `path` so an incoming entry can take its place.
fn clear_existing(path: &Path) -> Result<()> {
    let metadata = match path.symlink_metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(FlarmError::from_io(
                e,
                format!("Failed to inspect existing {}", path.display()),
            ))
        }
    };
    debug!("Replacing existing {}", path.display());
    let removed = if metadata.file_type().is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(FlarmError::from_io(
            e,
            format!("Could not replace existing {}", path.display()),
        )),
        _ => Ok(()),
    }
}

fn move_entry(from: &Path, to: &Path) -> Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(FlarmError::from_io(
                e,
                format!("Failed to move {} to {}", from.display(), to.display()),
            ))
        }
        Err(e) => e,
    };
    warn!(
        "Rename {} -> {} failed ({}), falling back to copy",
        from.display(),
        to.display(),
        rename_err
    );

    let is_real_dir = from
        .symlink_metadata()
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false);
    let copied = if is_real_dir {
        let mut options = CopyOptions::new();
        options.copy_inside = true;
        fs_extra::dir::move_dir(from, to, &options).map(|_| ())
    } else {
        let options = fs_extra::file::CopyOptions::new();
        fs_extra::file::move_file(from, to, &options).map(|_| ())
    };
    copied.map_err(|e| {
        FlarmError::InstallError(format!(
            "Failed to move {} to {}: {}",
            from.display(),
            to.display(),
            e
        ))
    })
}
