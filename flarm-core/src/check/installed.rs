// flarm-core/src/check/installed.rs
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flarm_common::error::{FlarmError, Result};
use flarm_common::model::PackageIdentity;
use serde::Serialize;
use tracing::{debug, warn};

use crate::manifest::parse_manifest;

/// One install record found under the apps root.
#[derive(Debug, Clone, Serialize)]
pub struct InstalledPackage {
    pub path: PathBuf,
    pub dir_name: String,
    pub identity: Option<PackageIdentity>,
    pub display_name: Option<String>,
}

impl InstalledPackage {
    fn from_dir(path: PathBuf, manifest_file: &str) -> Self {
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            identity: PackageIdentity::parse_dir_name(&dir_name),
            display_name: stored_display_name(&path, manifest_file),
            dir_name,
            path,
        }
    }

    /// Title for launchers and messages.
    pub fn title(&self) -> &str {
        self.display_name
            .as_deref()
            .or_else(|| self.identity.as_ref().map(|id| id.app_id.as_str()))
            .unwrap_or(&self.dir_name)
    }
}

// Helper closure to handle io::Result<DirEntry> -> Option<DirEntry> logging errors
fn handle_dir_entry(res: io::Result<fs::DirEntry>, dir: &Path) -> Option<fs::DirEntry> {
    match res {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Error reading entry in {}: {}", dir.display(), e);
            None
        }
    }
}

/// Child directory names of `apps_root`, sorted. A missing root is empty.
fn installed_dir_names(apps_root: &Path) -> Result<Vec<String>> {
    if !apps_root.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(apps_root).map_err(|e| {
        FlarmError::from_io(e, format!("Failed to read apps root {}", apps_root.display()))
    })?;
    let mut names: Vec<String> = entries
        .filter_map(|res| handle_dir_entry(res, apps_root))
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// The install record for exactly this identity, if present.
pub fn find_exact(identity: &PackageIdentity, apps_root: &Path) -> Option<PathBuf> {
    if let Err(e) = identity.ensure_path_safe() {
        debug!("Skipping exact install check: {}", e);
        return None;
    }
    let candidate = apps_root.join(identity.canonical_dir_name());
    let found = candidate.is_dir();
    debug!("Exact install check {}: {}", candidate.display(), found);
    found.then_some(candidate)
}

/// Any install record that looks like it belongs to `app_or_repo`, whatever
/// its version or platform.
///
/// Matches directory names containing `.<app_or_repo>.`; names published by
/// `owner` are preferred, then the first match by name.
pub fn find_loose(owner: &str, app_or_repo: &str, apps_root: &Path) -> Option<PathBuf> {
    if app_or_repo.is_empty() {
        return None;
    }
    let names = match installed_dir_names(apps_root) {
        Ok(names) => names,
        Err(e) => {
            warn!("Loose install check skipped: {}", e);
            return None;
        }
    };
    let needle = format!(".{app_or_repo}.");
    let owner_prefix = format!("{owner}.");
    let matching: Vec<&String> = names.iter().filter(|name| name.contains(&needle)).collect();

    let found = matching
        .iter()
        .find(|name| !owner.is_empty() && name.starts_with(&owner_prefix))
        .or_else(|| matching.first())
        .map(|name| apps_root.join(name.as_str()));
    debug!("Loose install check for {}: {:?}", needle, found);
    found
}

/// Every install record under `apps_root`.
pub fn list_installed(apps_root: &Path, manifest_file: &str) -> Result<Vec<InstalledPackage>> {
    Ok(installed_dir_names(apps_root)?
        .into_iter()
        .map(|name| InstalledPackage::from_dir(apps_root.join(name), manifest_file))
        .collect())
}

pub fn installed_package(path: &Path, manifest_file: &str) -> InstalledPackage {
    InstalledPackage::from_dir(path.to_path_buf(), manifest_file)
}

/// The `name` recorded in an install's saved manifest.
pub fn stored_display_name(install_dir: &Path, manifest_file: &str) -> Option<String> {
    let text = fs::read_to_string(install_dir.join(manifest_file)).ok()?;
    parse_manifest(&text).name
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn exact_match_requires_all_four_fields() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("acme.viewer.1.0-Danenone")).unwrap();

        let id = PackageIdentity::new("acme", "viewer", "1.0", "Danenone");
        assert_eq!(
            find_exact(&id, root.path()),
            Some(root.path().join("acme.viewer.1.0-Danenone"))
        );
        let other = PackageIdentity::new("acme", "viewer", "1.1", "Danenone");
        assert_eq!(find_exact(&other, root.path()), None);
        let cased = PackageIdentity::new("Acme", "viewer", "1.0", "Danenone");
        assert_eq!(find_exact(&cased, root.path()), None);
    }

    #[test]
    fn exact_match_never_looks_outside_the_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("apps");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(tmp.path().join("escaped.viewer.1.0-Danenone")).unwrap();

        let hostile = PackageIdentity::new("../escaped", "viewer", "1.0", "Danenone");
        assert_eq!(find_exact(&hostile, &root), None);
    }

    #[test]
    fn loose_match_prefers_owner_and_ignores_files() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("acme.viewer.1.0-Danenone")).unwrap();
        fs::create_dir_all(root.path().join("zed.viewer.2.0-Danenone")).unwrap();
        fs::write(root.path().join("alice.viewer.3.0-Danenone"), b"file").unwrap();

        assert_eq!(
            find_loose("zed", "viewer", root.path()),
            Some(root.path().join("zed.viewer.2.0-Danenone"))
        );
        assert_eq!(
            find_loose("alice", "viewer", root.path()),
            Some(root.path().join("acme.viewer.1.0-Danenone"))
        );
        assert_eq!(find_loose("acme", "editor", root.path()), None);
    }

    #[test]
    fn missing_root_means_nothing_installed() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("nope");
        assert_eq!(find_loose("a", "b", &missing), None);
        assert!(list_installed(&missing, "details.xml").unwrap().is_empty());
    }

    #[test]
    fn listing_reads_titles_from_saved_manifest() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("acme.viewer.1.0-Danenone");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("details.xml"), "<app><name>Flight Viewer</name></app>").unwrap();
        fs::create_dir_all(root.path().join("loose-folder")).unwrap();

        let listed = list_installed(root.path(), "details.xml").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title(), "Flight Viewer");
        assert_eq!(
            listed[0].identity.as_ref().map(|id| id.version.as_str()),
            Some("1.0")
        );
        assert_eq!(listed[1].title(), "loose-folder");
    }
}
