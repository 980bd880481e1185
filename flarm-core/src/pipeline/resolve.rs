// flarm-core/src/pipeline/resolve.rs
//! Turning a request into a package identity, and finding the install
//! record that identity refers to.

use std::path::Path;

use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::{
    InstallRequest, Manifest, ManifestField, PackageIdentity, PlatformAliases, PlatformTag,
    PLACEHOLDER_VALUE,
};
use flarm_common::remote::RemoteRepository;
use tracing::debug;

use super::Reporter;
use crate::asset::AssetPattern;
use crate::check::installed::{find_exact, find_loose, installed_package, InstalledPackage};
use crate::manifest::{parse_manifest, read_embedded_manifest};
use crate::platform::{check_compatibility, classify_platform};

pub(crate) const LOCAL_VERSION: &str = "local";
pub(crate) const UNKNOWN_PLATFORM: &str = "unknown";

/// Everything known about a package before anything is downloaded.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPackage {
    pub identity: PackageIdentity,
    pub display_name: String,
    pub short_name: String,
    pub manifest: Manifest,
    pub manifest_text: Option<String>,
    /// Platform segment of a local package's filename.
    pub filename_platform: Option<String>,
}

impl ResolvedPackage {
    /// Rejects packages whose manifest or filename names the other
    /// platform family.
    pub fn ensure_compatible(&self, current: PlatformTag, config: &Config) -> Result<()> {
        let declared = [
            self.manifest.get(ManifestField::Platform),
            self.filename_platform.as_deref(),
        ];
        for value in declared.into_iter().flatten() {
            let verdict = check_compatibility(value, current, &config.platform_aliases);
            if !verdict.compatible {
                return Err(FlarmError::IncompatiblePlatform(verdict.reason));
            }
        }
        Ok(())
    }
}

pub(crate) fn resolve_remote(
    owner: &str,
    repo: &str,
    client: &dyn RemoteRepository,
    reporter: &Reporter,
) -> ResolvedPackage {
    let manifest_text = match client.fetch_manifest(owner, repo) {
        Ok(Some(text)) => Some(text),
        Ok(None) => {
            reporter.warn(format!(
                "{owner}/{repo} publishes no manifest; using repository names"
            ));
            None
        }
        Err(e) => {
            reporter.warn(format!(
                "Could not fetch the manifest of {owner}/{repo} ({e}); using repository names"
            ));
            None
        }
    };
    let manifest = manifest_text
        .as_deref()
        .map(parse_manifest)
        .unwrap_or_default();

    let identity = PackageIdentity::new(
        manifest.value_or(ManifestField::Publisher, owner),
        manifest.value_or(ManifestField::App, repo),
        manifest.value_or(ManifestField::Version, PLACEHOLDER_VALUE),
        manifest.value_or(ManifestField::Platform, PLACEHOLDER_VALUE),
    );
    debug!("Resolved remote identity {:?}", identity);

    ResolvedPackage {
        display_name: manifest.value_or(ManifestField::Name, repo).to_string(),
        short_name: repo.to_string(),
        identity,
        manifest,
        manifest_text,
        filename_platform: None,
    }
}

pub(crate) fn resolve_local(
    path: &Path,
    config: &Config,
    pattern: &AssetPattern,
    reporter: &Reporter,
) -> Result<ResolvedPackage> {
    let has_extension = path
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&config.package_extension));
    if !has_extension {
        return Err(FlarmError::InvalidRequest(format!(
            "{} is not a .{} package",
            path.display(),
            config.package_extension
        )));
    }
    if !path.is_file() {
        return Err(FlarmError::InvalidRequest(format!(
            "Package file {} does not exist",
            path.display()
        )));
    }

    let manifest_text = match read_embedded_manifest(path, &config.manifest_file_name) {
        Ok(text) => text,
        Err(e) => {
            reporter.warn(format!("Could not read the embedded manifest: {e}"));
            None
        }
    };
    if manifest_text.is_none() {
        reporter.warn(format!(
            "{} carries no {}; deriving names from the file name",
            path.display(),
            config.manifest_file_name
        ));
    }
    let manifest = manifest_text
        .as_deref()
        .map(parse_manifest)
        .unwrap_or_default();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parsed = pattern.parse_with_hint(&file_name, manifest.value_or(ManifestField::App, ""));
    let fallback_id = parsed
        .as_ref()
        .map(|p| p.identifier.clone())
        .unwrap_or(stem);

    let app_id = manifest
        .value_or(ManifestField::App, &fallback_id)
        .to_string();
    let identity = PackageIdentity::new(
        manifest.value_or(ManifestField::Publisher, &fallback_id),
        app_id.clone(),
        parsed
            .as_ref()
            .map(|p| p.version.as_str())
            .or(manifest.get(ManifestField::Version))
            .unwrap_or(LOCAL_VERSION),
        parsed
            .as_ref()
            .map(|p| p.platform.as_str())
            .or(manifest.get(ManifestField::Platform))
            .unwrap_or(UNKNOWN_PLATFORM),
    );
    debug!("Resolved local identity {:?}", identity);

    Ok(ResolvedPackage {
        display_name: manifest.value_or(ManifestField::Name, &app_id).to_string(),
        short_name: app_id,
        identity,
        filename_platform: parsed.map(|p| p.platform),
        manifest,
        manifest_text,
    })
}

/// An existing installation and the name its executable goes by.
#[derive(Debug, Clone)]
pub struct LocatedInstall {
    pub installed: InstalledPackage,
    pub short_name: String,
}

impl LocatedInstall {
    pub fn title(&self) -> &str {
        self.installed.title()
    }
}

/// The resolved identity, then the same release under each alias of its
/// platform family. Remote installs are named after the asset filename,
/// which spells the platform the way the publisher did.
fn exact_candidates(
    identity: &PackageIdentity,
    aliases: &PlatformAliases,
) -> Vec<PackageIdentity> {
    let mut candidates = vec![identity.clone()];
    if let Some(tag) = classify_platform(&identity.platform, aliases) {
        candidates.extend(
            std::iter::once(tag.as_str().to_string())
                .chain(aliases.aliases_for(tag).iter().cloned())
                .filter(|platform| *platform != identity.platform)
                .map(|platform| PackageIdentity {
                    platform,
                    ..identity.clone()
                }),
        );
    }
    candidates
}

/// Finds the install record a request refers to, if any.
///
/// Exact matches are tried first, under every spelling of the platform.
/// Remote requests fall back to a loose match on the app id or repository
/// name, so an installed older version is still found after the published
/// manifest moved on.
pub fn locate_installation(
    request: &InstallRequest,
    config: &Config,
    client: &dyn RemoteRepository,
    reporter: &Reporter,
) -> Result<Option<LocatedInstall>> {
    let pattern = AssetPattern::new(&config.package_extension)?;
    let resolved = match request {
        InstallRequest::Remote { owner, repo } => resolve_remote(owner, repo, client, reporter),
        InstallRequest::Local { path } => resolve_local(path, config, &pattern, reporter)?,
    };

    let mut found = if resolved.identity.is_complete() || request.is_local() {
        exact_candidates(&resolved.identity, &config.platform_aliases)
            .iter()
            .find_map(|candidate| find_exact(candidate, &config.apps_root))
    } else {
        None
    };
    if found.is_none() {
        if let InstallRequest::Remote { owner, repo } = request {
            found = find_loose(&resolved.identity.publisher, &resolved.identity.app_id, &config.apps_root)
                .or_else(|| find_loose(owner, repo, &config.apps_root));
        }
    }

    Ok(found.map(|path| {
        let mut installed = installed_package(&path, &config.manifest_file_name);
        if installed.display_name.is_none() {
            installed.display_name = Some(resolved.display_name.clone());
        }
        LocatedInstall {
            installed,
            short_name: resolved.short_name,
        }
    }))
}
