use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::{InstallRequest, PlatformTag, ReleaseAsset};
use flarm_common::pipeline::{event_channel, EventReceiver, PipelineEvent};
use flarm_common::remote::{RemoteRepository, RemoteStream};
use flarm_core::pipeline::{locate_installation, run_install, start_install_worker, Reporter};
use flarm_core::platform::current_platform_tag;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// In-memory stand-in for a release host.
#[derive(Default)]
struct FakeRepository {
    manifest: Option<String>,
    assets: Vec<ReleaseAsset>,
    payloads: HashMap<String, Vec<u8>>,
    listing_fails: bool,
    unknown_length: bool,
    stream_breaks: bool,
    downloads: AtomicUsize,
}

/// Serves a few bytes, then fails like a dropped connection.
struct BrokenReader {
    served: bool,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"));
        }
        self.served = true;
        let n = buf.len().min(4);
        buf[..n].copy_from_slice(&b"PK\x03\x04"[..n]);
        Ok(n)
    }
}

impl FakeRepository {
    fn with_asset(mut self, name: &str, payload: Vec<u8>) -> Self {
        let url = format!("https://downloads.test/{name}");
        self.assets
            .push(ReleaseAsset::new(name, url.clone()).with_release_tag("v-test"));
        self.payloads.insert(url, payload);
        self
    }

    fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl RemoteRepository for FakeRepository {
    fn list_release_assets(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseAsset>> {
        if self.listing_fails {
            return Err(FlarmError::NetworkUnavailable(format!(
                "{owner}/{repo}: connection refused"
            )));
        }
        Ok(self.assets.clone())
    }

    fn fetch_manifest(&self, _owner: &str, _repo: &str) -> Result<Option<String>> {
        Ok(self.manifest.clone())
    }

    fn fetch_bytes(&self, url: &str) -> Result<RemoteStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .payloads
            .get(url)
            .cloned()
            .ok_or_else(|| FlarmError::NotFound(url.to_string()))?;
        if self.stream_breaks {
            return Ok(RemoteStream {
                content_length: Some(bytes.len() as u64),
                reader: Box::new(BrokenReader { served: false }),
            });
        }
        Ok(RemoteStream {
            content_length: (!self.unknown_length).then_some(bytes.len() as u64),
            reader: Box::new(Cursor::new(bytes)),
        })
    }

    fn releases_page_url(&self, owner: &str, repo: &str) -> String {
        format!("https://releases.test/{owner}/{repo}")
    }
}

fn platform_word(tag: PlatformTag) -> &'static str {
    match tag {
        PlatformTag::Knosthalij => "windows",
        PlatformTag::Danenone => "linux",
    }
}

fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn manifest_xml(platform: &str) -> String {
    format!(
        "<app><name>Flight Viewer</name><publisher>acme</publisher><app>viewer</app>\
         <version>1.2.0</version><platform>{platform}</platform></app>"
    )
}

fn test_config(tmp: &TempDir) -> Config {
    Config::new(tmp.path().join("apps"), tmp.path().join("Desktop"))
}

fn drain(rx: &mut EventReceiver) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn terminal_count(events: &[PipelineEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

/// Scratch directories in the system temp dir still holding `file_name`.
fn leftover_scratch(file_name: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(std::env::temp_dir()) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("flarm_"))
        .map(|entry| entry.path().join(file_name))
        .filter(|path| path.exists())
        .collect()
}

/// An asset name no other test run will produce.
fn unique_asset_name(tmp: &TempDir) -> String {
    let token: String = tmp
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let word = platform_word(current_platform_tag());
    format!("viewer-1.0.{token}-{word}.iflapp")
}

fn remote() -> InstallRequest {
    InstallRequest::Remote {
        owner: "acme".to_string(),
        repo: "viewer".to_string(),
    }
}

#[test]
fn remote_install_then_repeat_is_already_installed() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let here = current_platform_tag();
    let word = platform_word(here);
    let asset_name = format!("viewer-1.2.0-{word}.iflapp");
    let repo = FakeRepository {
        manifest: Some(manifest_xml(here.as_str())),
        ..Default::default()
    }
    .with_asset(
        &asset_name,
        zip_bytes(&[("viewer.exe", b"MZ"), ("data/readme.txt", b"hi")]),
    );

    let (tx, mut rx) = event_channel();
    let outcome = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap();
    let events = drain(&mut rx);

    let expected_dir = config
        .install_dir(&format!("acme.viewer.1.2.0-{word}"))
        .unwrap();
    assert_eq!(outcome.install_path, expected_dir);
    assert!(!outcome.already_installed);
    assert!(expected_dir.join("viewer.exe").is_file());
    assert!(expected_dir.join("data/readme.txt").is_file());
    assert!(expected_dir.join("details.xml").is_file());
    assert_eq!(terminal_count(&events), 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::DownloadProgress { percent: 100 })));
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::ShortcutCreated { .. })));
    assert_eq!(repo.downloads(), 1);

    let (tx, mut rx) = event_channel();
    let again = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap();
    assert!(again.already_installed);
    assert_eq!(again.install_path, expected_dir);
    assert_eq!(repo.downloads(), 1);
    assert_eq!(terminal_count(&drain(&mut rx)), 1);
}

#[test]
fn newest_asset_for_this_platform_is_chosen() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let here = current_platform_tag();
    let other = platform_word(here.opposite());
    let word = platform_word(here);
    let repo = FakeRepository::default()
        .with_asset(
            &format!("viewer-3.0-{other}.iflapp"),
            zip_bytes(&[("wrong.txt", b"x")]),
        )
        .with_asset(
            &format!("viewer-2.0-{word}.iflapp"),
            zip_bytes(&[("right.txt", b"x")]),
        )
        .with_asset(
            &format!("viewer-1.0-{word}.iflapp"),
            zip_bytes(&[("old.txt", b"x")]),
        );

    let outcome = run_install(&remote(), &config, &repo, &Reporter::silent()).unwrap();
    assert_eq!(outcome.identity.version, "2.0");
    assert_eq!(outcome.identity.publisher, "acme");
    assert!(outcome.install_path.join("right.txt").is_file());
}

#[test]
fn incompatible_manifest_fails_before_download() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let other = current_platform_tag().opposite();
    let repo = FakeRepository {
        manifest: Some(manifest_xml(other.as_str())),
        ..Default::default()
    }
    .with_asset("viewer-1.2.0-anything.iflapp", zip_bytes(&[("a", b"a")]));

    let (tx, mut rx) = event_channel();
    let err = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap_err();
    assert!(matches!(err, FlarmError::IncompatiblePlatform(_)));
    assert_eq!(repo.downloads(), 0);
    assert!(!config.apps_root.exists());

    let events = drain(&mut rx);
    assert_eq!(terminal_count(&events), 1);
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::JobFailed {
            retryable: false,
            ..
        })
    ));
}

#[test]
fn no_matching_asset_offers_releases_page() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let repo = FakeRepository::default()
        .with_asset("notes.txt", b"not a package".to_vec())
        .with_asset("other-1.0.zip", zip_bytes(&[("a", b"a")]));

    let (tx, mut rx) = event_channel();
    let err = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap_err();
    assert!(matches!(err, FlarmError::NoCompatibleAsset { .. }));

    let events = drain(&mut rx);
    let offered: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::OfferReleasesPage { url } => Some(url.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(offered, vec!["https://releases.test/acme/viewer"]);
    assert_eq!(terminal_count(&events), 1);
}

#[test]
fn listing_failure_is_retryable_and_offers_releases_page() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let repo = FakeRepository {
        listing_fails: true,
        ..Default::default()
    };

    let (tx, mut rx) = event_channel();
    let err = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap_err();
    assert!(err.is_retryable());

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::OfferReleasesPage { .. })));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::JobFailed {
            retryable: true,
            ..
        })
    ));
}

#[test]
fn local_package_installs_from_disk() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let here = current_platform_tag();
    let word = platform_word(here);
    let package = tmp.path().join(format!("viewer-0.9-{word}.iflapp"));
    fs::write(
        &package,
        zip_bytes(&[
            ("details.xml", manifest_xml(here.as_str()).as_bytes()),
            ("viewer.exe", b"MZ"),
        ]),
    )
    .unwrap();
    let request = InstallRequest::Local {
        path: package.clone(),
    };
    let repo = FakeRepository::default();

    let outcome = run_install(&request, &config, &repo, &Reporter::silent()).unwrap();
    let expected = config
        .install_dir(&format!("acme.viewer.0.9-{word}"))
        .unwrap();
    assert_eq!(outcome.install_path, expected);
    assert!(expected.join("viewer.exe").is_file());
    assert!(package.is_file(), "source package must be left in place");
    assert_eq!(repo.downloads(), 0);

    let again = run_install(&request, &config, &repo, &Reporter::silent()).unwrap();
    assert!(again.already_installed);

    let located = locate_installation(&request, &config, &repo, &Reporter::silent())
        .unwrap()
        .unwrap();
    assert_eq!(located.installed.path, expected);
    assert_eq!(located.title(), "Flight Viewer");
}

#[test]
fn local_package_for_other_platform_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let other = platform_word(current_platform_tag().opposite());
    let package = tmp.path().join(format!("viewer-0.9-{other}.iflapp"));
    fs::write(&package, zip_bytes(&[("viewer.exe", b"MZ")])).unwrap();

    let err = run_install(
        &InstallRequest::Local { path: package },
        &config,
        &FakeRepository::default(),
        &Reporter::silent(),
    )
    .unwrap_err();
    assert!(matches!(err, FlarmError::IncompatiblePlatform(_)));
}

#[test]
fn missing_local_package_is_invalid() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let err = run_install(
        &InstallRequest::Local {
            path: tmp.path().join("ghost-1.0-linux.iflapp"),
        },
        &config,
        &FakeRepository::default(),
        &Reporter::silent(),
    )
    .unwrap_err();
    assert!(matches!(err, FlarmError::InvalidRequest(_)));
}

#[test]
fn opaque_payload_is_installed_as_single_file() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let word = platform_word(current_platform_tag());
    let name = format!("viewer-1.0-{word}.iflapp");
    let repo = FakeRepository::default().with_asset(&name, b"#!/bin/sh\necho hi\n".to_vec());

    let outcome = run_install(&remote(), &config, &repo, &Reporter::silent()).unwrap();
    assert!(outcome.install_path.join(&name).is_file());
}

#[test]
fn worker_thread_sends_exactly_one_terminal_event() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let word = platform_word(current_platform_tag());
    let repo: Arc<dyn RemoteRepository> = Arc::new(
        FakeRepository::default().with_asset(
            &format!("viewer-1.0-{word}.iflapp"),
            zip_bytes(&[("viewer.exe", b"MZ")]),
        ),
    );

    let (tx, mut rx) = event_channel();
    let handle = start_install_worker(config.clone(), repo, remote(), tx).unwrap();
    handle.join().unwrap();

    let events = drain(&mut rx);
    assert_eq!(terminal_count(&events), 1);
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::JobSuccess {
            already_installed: false,
            ..
        })
    ));
}

#[test]
fn scratch_space_is_cleaned_up() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let word = platform_word(current_platform_tag());
    let repo = FakeRepository::default().with_asset(
        &format!("viewer-1.0-{word}.iflapp"),
        zip_bytes(&[("viewer.exe", b"MZ")]),
    );

    let (tx, mut rx) = event_channel();
    run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap();
    let downloaded = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            PipelineEvent::DownloadFinished { path, .. } => Some(path),
            _ => None,
        })
        .unwrap();
    assert!(!downloaded.exists());
    assert!(!downloaded.parent().map(Path::exists).unwrap_or(false));
}

#[test]
fn manifest_cannot_move_install_outside_apps_root() {
    let tmp = TempDir::new().unwrap();
    let config = Config::new(tmp.path().join("root/apps"), tmp.path().join("Desktop"));
    let here = current_platform_tag();
    let word = platform_word(here);
    let manifest = format!(
        "<app><name>Viewer</name><publisher>../../escaped</publisher><app>viewer</app>\
         <version>1.0</version><platform>{}</platform></app>",
        here.as_str()
    );
    let repo = FakeRepository {
        manifest: Some(manifest),
        ..Default::default()
    }
    .with_asset(
        &format!("viewer-1.0-{word}.iflapp"),
        zip_bytes(&[("viewer.exe", b"MZ")]),
    );

    let (tx, mut rx) = event_channel();
    let err = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap_err();
    assert!(matches!(err, FlarmError::InvalidRequest(_)));
    assert_eq!(repo.downloads(), 0);
    assert!(!tmp.path().join(format!("escaped.viewer.1.0-{word}")).exists());
    assert!(!config.apps_root.exists());
    assert_eq!(terminal_count(&drain(&mut rx)), 1);
}

#[test]
fn unknown_length_download_reports_no_progress() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let word = platform_word(current_platform_tag());
    let repo = FakeRepository {
        unknown_length: true,
        ..Default::default()
    }
    .with_asset(
        &format!("viewer-1.0-{word}.iflapp"),
        zip_bytes(&[("viewer.exe", b"MZ")]),
    );

    let (tx, mut rx) = event_channel();
    let outcome = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap();
    assert!(outcome.install_path.join("viewer.exe").is_file());

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, PipelineEvent::DownloadProgress { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::DownloadFinished { .. })));
}

#[test]
fn broken_download_leaves_no_scratch_behind() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let name = unique_asset_name(&tmp);
    let repo = FakeRepository {
        stream_breaks: true,
        ..Default::default()
    }
    .with_asset(&name, zip_bytes(&[("viewer.exe", b"MZ")]));

    let err = run_install(&remote(), &config, &repo, &Reporter::silent()).unwrap_err();
    assert!(matches!(err, FlarmError::NetworkUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(repo.downloads(), 1);
    assert!(leftover_scratch(&name).is_empty());
    assert!(!config.apps_root.exists());
}

#[test]
fn corrupt_archive_leaves_no_scratch_behind() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let name = unique_asset_name(&tmp);
    let mut payload = b"PK\x03\x04".to_vec();
    payload.extend_from_slice(&[0xAB; 64]);
    let repo = FakeRepository::default().with_asset(&name, payload);

    let (tx, mut rx) = event_channel();
    let err = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap_err();
    assert!(matches!(err, FlarmError::ArchiveCorrupt(_)));

    let events = drain(&mut rx);
    let downloaded = events
        .iter()
        .find_map(|e| match e {
            PipelineEvent::DownloadFinished { path, .. } => Some(path.clone()),
            _ => None,
        })
        .unwrap();
    assert!(!downloaded.exists());
    assert!(!downloaded.parent().map(Path::exists).unwrap_or(false));
    assert!(leftover_scratch(&name).is_empty());
    assert_eq!(terminal_count(&events), 1);
}

#[test]
fn failed_shortcut_does_not_fail_install() {
    let tmp = TempDir::new().unwrap();
    // A regular file where the desktop's parent should be.
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();
    let config = Config::new(tmp.path().join("apps"), blocker.join("Desktop"));
    let here = current_platform_tag();
    let word = platform_word(here);
    let repo = FakeRepository {
        manifest: Some(manifest_xml(here.as_str())),
        ..Default::default()
    }
    .with_asset(
        &format!("viewer-1.2.0-{word}.iflapp"),
        zip_bytes(&[("viewer.exe", b"MZ")]),
    );

    let (tx, mut rx) = event_channel();
    let outcome = run_install(&remote(), &config, &repo, &Reporter::new(tx)).unwrap();
    assert!(!outcome.already_installed);
    assert!(outcome.install_path.join("viewer.exe").is_file());
    assert!(outcome.install_path.join("details.xml").is_file());

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, PipelineEvent::ShortcutCreated { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::LogWarn { message } if message.contains("shortcut")
    )));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::JobSuccess { .. })
    ));
}

#[test]
fn remote_install_is_located_exactly_over_older_versions() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let here = current_platform_tag();
    let word = platform_word(here);
    let repo = FakeRepository {
        manifest: Some(manifest_xml(here.as_str())),
        ..Default::default()
    }
    .with_asset(
        &format!("viewer-1.2.0-{word}.iflapp"),
        zip_bytes(&[("viewer.exe", b"MZ")]),
    );

    let outcome = run_install(&remote(), &config, &repo, &Reporter::silent()).unwrap();
    // Sorts ahead of the real install in a loose scan.
    fs::create_dir_all(config.apps_root.join(format!("acme.viewer.0.1-{word}"))).unwrap();

    let located = locate_installation(&remote(), &config, &repo, &Reporter::silent())
        .unwrap()
        .unwrap();
    assert_eq!(located.installed.path, outcome.install_path);
    assert_eq!(located.title(), "Flight Viewer");
}
