// flarm-core/src/install/shortcut.rs
//! Executable discovery and desktop launchers for installed packages.

use std::fs;
use std::path::{Path, PathBuf};

use flarm_common::error::{FlarmError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

/// Every launcher extension any platform may have written.
pub const SHORTCUT_EXTENSIONS: [&str; 4] = ["lnk", "url", "desktop", "command"];

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn sorted_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

/// Finds the package's main executable: a file named after `short_name`
/// (case-insensitively) with an `.exe` or `.elf` suffix, or with no suffix
/// and the executable bit set.
pub fn find_executable(root: &Path, short_name: &str) -> Option<PathBuf> {
    if short_name.is_empty() {
        return None;
    }
    let base = short_name.to_lowercase();
    let exe = format!("{base}.exe");
    let elf = format!("{base}.elf");

    let found = sorted_files(root).find(|path| {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            return false;
        };
        name == exe || name == elf || (name == base && is_executable(path))
    });
    debug!(
        "Executable lookup for '{}' under {}: {:?}",
        short_name,
        root.display(),
        found
    );
    found
}

/// Like [`find_executable`], falling back to the first `.exe` anywhere in
/// the tree.
pub fn find_launch_target(root: &Path, short_name: &str) -> Option<PathBuf> {
    find_executable(root, short_name).or_else(|| {
        sorted_files(root).find(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
        })
    })
}

lazy_static! {
    static ref FORBIDDEN_NAME_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
}

/// Strips characters that are not allowed in file names on any platform.
pub fn sanitize_shortcut_name(name: &str) -> String {
    FORBIDDEN_NAME_CHARS.replace_all(name, "").trim().to_string()
}

/// Every launcher path an install titled `name` may have left in `dir`.
pub fn shortcut_paths(dir: &Path, name: &str) -> Vec<PathBuf> {
    let name = sanitize_shortcut_name(name);
    SHORTCUT_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .collect()
}

/// Writes a launcher for `target` into `dir` and returns its path.
pub fn create_shortcut(dir: &Path, target: &Path, name: &str) -> Result<PathBuf> {
    let name = sanitize_shortcut_name(name);
    if name.is_empty() {
        return Err(FlarmError::InstallError(
            "Shortcut name is empty after removing forbidden characters".to_string(),
        ));
    }
    fs::create_dir_all(dir).map_err(|e| {
        FlarmError::from_io(e, format!("Failed to create shortcut dir {}", dir.display()))
    })?;

    let (path, contents) = launcher_contents(dir, target, &name);
    fs::write(&path, contents).map_err(|e| {
        FlarmError::from_io(e, format!("Failed to write shortcut {}", path.display()))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(|e| {
            FlarmError::from_io(e, format!("Failed to mark {} executable", path.display()))
        })?;
    }

    debug!("Created shortcut {} -> {}", path.display(), target.display());
    Ok(path)
}

#[cfg(windows)]
fn launcher_contents(dir: &Path, target: &Path, name: &str) -> (PathBuf, String) {
    let url = target.display().to_string().replace('\\', "/");
    (
        dir.join(format!("{name}.url")),
        format!("[InternetShortcut]\nURL=file:///{url}\n"),
    )
}

#[cfg(target_os = "macos")]
fn launcher_contents(dir: &Path, target: &Path, name: &str) -> (PathBuf, String) {
    (
        dir.join(format!("{name}.command")),
        format!("#!/bin/bash\n\"{}\"\n", target.display()),
    )
}

#[cfg(not(any(windows, target_os = "macos")))]
fn launcher_contents(dir: &Path, target: &Path, name: &str) -> (PathBuf, String) {
    (
        dir.join(format!("{name}.desktop")),
        format!(
            "[Desktop Entry]\nType=Application\nName={name}\nExec=\"{}\"\nTerminal=false\nIcon=\nCategories=Utility;\n",
            target.display()
        ),
    )
}
