// flarm-core/src/pipeline/worker.rs
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::{InstallRequest, PackageIdentity, ReleaseAsset};
use flarm_common::pipeline::{InstallStage, PipelineEvent};
use flarm_common::remote::RemoteRepository;
use tempfile::TempDir;
use tracing::{debug, instrument};

use super::resolve::{resolve_local, resolve_remote, ResolvedPackage};
use super::Reporter;
use crate::asset::{select_best_asset, AssetPattern};
use crate::check::installed::{find_exact, find_loose};
use crate::install::extract::extract_archive;
use crate::install::mover::move_install_tree;
use crate::install::shortcut::{create_shortcut, find_executable};
use crate::platform::{check_compatibility, current_platform_tag};
use crate::uninstall::uninstall_package;

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub install_path: PathBuf,
    pub already_installed: bool,
    pub identity: PackageIdentity,
}

/// Runs one install attempt and publishes exactly one terminal event for
/// it.
pub fn run_install(
    request: &InstallRequest,
    config: &Config,
    client: &dyn RemoteRepository,
    reporter: &Reporter,
) -> Result<InstallOutcome> {
    let result = execute_install(request, config, client, reporter);
    match &result {
        Ok(outcome) => {
            reporter.stage(InstallStage::Done);
            reporter.send(PipelineEvent::JobSuccess {
                install_path: outcome.install_path.clone(),
                already_installed: outcome.already_installed,
            });
        }
        Err(e) => {
            reporter.stage(InstallStage::Failed);
            if let Some(url) = e.releases_fallback() {
                reporter.send(PipelineEvent::OfferReleasesPage {
                    url: url.to_string(),
                });
            }
            reporter.send(PipelineEvent::job_failed(e));
        }
    }
    result
}

/// Runs one uninstall and publishes its terminal event.
pub fn run_uninstall(
    install_dir: &Path,
    display_name: &str,
    config: &Config,
    reporter: &Reporter,
) -> Result<()> {
    let result = uninstall_package(install_dir, display_name, config, reporter);
    match &result {
        Ok(()) => reporter.send(PipelineEvent::UninstallFinished {
            path: install_dir.to_path_buf(),
        }),
        Err(e) => reporter.send(PipelineEvent::job_failed(e)),
    }
    result
}

/// The install state machine, without the terminal event.
#[instrument(skip_all, fields(request = %request.label()))]
pub fn execute_install(
    request: &InstallRequest,
    config: &Config,
    client: &dyn RemoteRepository,
    reporter: &Reporter,
) -> Result<InstallOutcome> {
    let pattern = AssetPattern::new(&config.package_extension)?;
    let current = current_platform_tag();

    reporter.stage(InstallStage::ResolvingIdentity);
    let resolved = match request {
        InstallRequest::Remote { owner, repo } => resolve_remote(owner, repo, client, reporter),
        InstallRequest::Local { path } => resolve_local(path, config, &pattern, reporter)?,
    };
    resolved.ensure_compatible(current, config)?;
    resolved.identity.ensure_path_safe()?;

    reporter.stage(InstallStage::CheckingInstalled);
    let existing = match request {
        InstallRequest::Local { .. } => find_exact(&resolved.identity, &config.apps_root),
        InstallRequest::Remote { owner, repo } => {
            if resolved.identity.is_complete() {
                find_exact(&resolved.identity, &config.apps_root)
            } else {
                find_loose(owner, repo, &config.apps_root)
            }
        }
    };
    if let Some(path) = existing {
        reporter.info(format!(
            "{} is already installed at {}",
            resolved.display_name,
            path.display()
        ));
        return Ok(InstallOutcome {
            install_path: path,
            already_installed: true,
            identity: resolved.identity,
        });
    }

    let scratch = tempfile::Builder::new()
        .prefix("flarm_")
        .tempdir()
        .map_err(|e| FlarmError::from_io(e, "Failed to create scratch directory"))?;

    let (identity, payload) = match request {
        InstallRequest::Local { path } => (resolved.identity.clone(), path.clone()),
        InstallRequest::Remote { owner, repo } => {
            let (identity, asset) =
                pick_remote_asset(owner, repo, &resolved, config, client, &pattern, reporter)?;
            identity.ensure_path_safe()?;
            if let Some(path) = find_exact(&identity, &config.apps_root) {
                reporter.info(format!(
                    "{} {} is already installed at {}",
                    resolved.display_name,
                    identity.version,
                    path.display()
                ));
                return Ok(InstallOutcome {
                    install_path: path,
                    already_installed: true,
                    identity,
                });
            }

            reporter.stage(InstallStage::Downloading);
            let payload = download_asset(client, &asset, &scratch, reporter)?;
            (identity, payload)
        }
    };

    reporter.stage(InstallStage::Extracting);
    let staging = scratch.path().join("extract");
    if !extract_archive(&payload, &staging)? {
        reporter.info("Package is not an archive; installing it as a single file");
    }

    reporter.stage(InstallStage::Moving);
    let install_dir = config.install_dir(&identity.canonical_dir_name())?;
    let install_path = move_install_tree(&staging, &install_dir)?;
    reporter.info(format!("Installed to {}", install_path.display()));

    reporter.stage(InstallStage::RecordingMetadata);
    record_metadata(&resolved, &install_path, config, reporter);

    drop(scratch);
    Ok(InstallOutcome {
        install_path,
        already_installed: false,
        identity,
    })
}

fn pick_remote_asset(
    owner: &str,
    repo: &str,
    resolved: &ResolvedPackage,
    config: &Config,
    client: &dyn RemoteRepository,
    pattern: &AssetPattern,
    reporter: &Reporter,
) -> Result<(PackageIdentity, ReleaseAsset)> {
    reporter.stage(InstallStage::FetchingAsset);
    let releases_url = client.releases_page_url(owner, repo);

    let assets = client.list_release_assets(owner, repo).inspect_err(|e| {
        reporter.error(format!("Could not list releases of {owner}/{repo}: {e}"));
        reporter.send(PipelineEvent::OfferReleasesPage {
            url: releases_url.clone(),
        });
    })?;
    if assets.is_empty() {
        reporter.warn(format!("{owner}/{repo} has no release assets"));
    }

    let current = current_platform_tag();
    let selection = select_best_asset(
        &assets,
        &resolved.short_name,
        current,
        &config.platform_aliases,
        pattern,
    )
    .ok_or_else(|| FlarmError::NoCompatibleAsset {
        repository: format!("{owner}/{repo}"),
        releases_url,
    })?;

    let verdict = check_compatibility(&selection.platform, current, &config.platform_aliases);
    if !verdict.compatible {
        reporter.warn(format!(
            "{} was picked by name only: {}",
            selection.asset.name, verdict.reason
        ));
    }
    reporter.info(format!(
        "Selected {} from release {}",
        selection.asset.name,
        selection.asset.release_tag.as_deref().unwrap_or("?")
    ));

    let identity = PackageIdentity::new(
        resolved.identity.publisher.clone(),
        resolved.identity.app_id.clone(),
        selection.version,
        selection.platform,
    );
    Ok((identity, selection.asset))
}

fn map_read_error(e: io::Error, url: &str) -> FlarmError {
    match e.kind() {
        io::ErrorKind::TimedOut => FlarmError::Timeout(format!("Reading {url}: {e}")),
        _ => FlarmError::NetworkUnavailable(format!("Reading {url}: {e}")),
    }
}

/// Streams an asset into the scratch directory, reporting whole percents
/// when the total size is known.
fn download_asset(
    client: &dyn RemoteRepository,
    asset: &ReleaseAsset,
    scratch: &TempDir,
    reporter: &Reporter,
) -> Result<PathBuf> {
    let file_name = Path::new(&asset.name)
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| FlarmError::InvalidRequest(format!("Bad asset name '{}'", asset.name)))?;
    let dest = scratch.path().join(file_name);

    reporter.send(PipelineEvent::DownloadStarted {
        asset_name: asset.name.clone(),
        url: asset.download_url.clone(),
    });
    let mut stream = client.fetch_bytes(&asset.download_url)?;
    let total = stream.content_length.filter(|len| *len > 0);

    let file = File::create(&dest)
        .map_err(|e| FlarmError::from_io(e, format!("Failed to create {}", dest.display())))?;
    let mut writer = BufWriter::new(file);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut downloaded: u64 = 0;
    let mut last_percent: Option<u8> = None;

    loop {
        let n = match stream.reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(map_read_error(e, &asset.download_url)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| FlarmError::from_io(e, format!("Failed to write {}", dest.display())))?;
        downloaded += n as u64;

        if let Some(total) = total {
            let percent = (downloaded.saturating_mul(100) / total).min(100) as u8;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                reporter.send(PipelineEvent::DownloadProgress { percent });
            }
        }
    }
    writer
        .flush()
        .map_err(|e| FlarmError::from_io(e, format!("Failed to write {}", dest.display())))?;

    debug!("Downloaded {} bytes to {}", downloaded, dest.display());
    reporter.send(PipelineEvent::DownloadFinished {
        path: dest.clone(),
        size_bytes: downloaded,
    });
    Ok(dest)
}

/// Saves the manifest next to the installed files and creates a launcher.
/// Neither step can fail the install.
fn record_metadata(
    resolved: &ResolvedPackage,
    install_path: &Path,
    config: &Config,
    reporter: &Reporter,
) {
    let manifest_path = install_path.join(&config.manifest_file_name);
    match &resolved.manifest_text {
        Some(text) if !manifest_path.is_file() => {
            if let Err(e) = fs::write(&manifest_path, text) {
                reporter.warn(format!(
                    "Could not save {}: {}",
                    manifest_path.display(),
                    e
                ));
            }
        }
        Some(_) => debug!("{} already present", manifest_path.display()),
        None => debug!("No manifest to record"),
    }

    match find_executable(install_path, &resolved.short_name) {
        Some(exe) => match create_shortcut(&config.desktop_dir, &exe, &resolved.display_name) {
            Ok(path) => reporter.send(PipelineEvent::ShortcutCreated { path }),
            Err(e) => reporter.warn(format!("Could not create a shortcut: {e}")),
        },
        None => reporter.info(format!(
            "No executable named '{}' found; skipping shortcut",
            resolved.short_name
        )),
    }
}
