// flarm-core/src/manifest.rs
//! Reading `details.xml` manifests, both standalone and from inside a
//! package archive.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path};

use bzip2::read::BzDecoder;
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::{Manifest, ManifestField};
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::RegexBuilder;
use tar::Archive;
use tracing::{debug, warn};
use xz2::read::XzDecoder;
use zip::ZipArchive;

use crate::install::extract::{detect_archive_kind, ArchiveKind};

/// Parses a manifest document. Never fails: a malformed document falls back
/// to pattern extraction and missing fields stay absent.
pub fn parse_manifest(text: &str) -> Manifest {
    match parse_structured(text) {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!("Structured manifest parse failed ({}), using pattern fallback", e);
            parse_with_patterns(text)
        }
    }
}

/// Direct children of the root element whose lowercase tag is a known field.
fn parse_structured(text: &str) -> Result<Manifest> {
    let mut reader = Reader::from_str(text);
    let mut manifest = Manifest::default();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut current: Option<ManifestField> = None;
    let mut buffer = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| FlarmError::ManifestUnparseable(e.to_string()))?;
        match event {
            Event::Start(start) => {
                if depth == 0 && saw_root {
                    return Err(FlarmError::ManifestUnparseable(
                        "multiple root elements".to_string(),
                    ));
                }
                depth += 1;
                saw_root = true;
                if depth == 2 {
                    let tag = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                    current = ManifestField::from_tag(&tag);
                    buffer.clear();
                }
            }
            Event::Empty(empty) => {
                if depth == 0 {
                    saw_root = true;
                } else if depth == 1 {
                    let tag = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                    if let Some(field) = ManifestField::from_tag(&tag) {
                        manifest.set(field, "");
                    }
                }
            }
            Event::Text(text) if depth == 2 && current.is_some() => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| FlarmError::ManifestUnparseable(e.to_string()))?;
                buffer.push_str(&unescaped);
            }
            Event::CData(data) if depth == 2 && current.is_some() => {
                buffer.push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some(field) = current.take() {
                        manifest.set(field, &buffer);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root || depth != 0 {
        return Err(FlarmError::ManifestUnparseable(
            "document has no complete root element".to_string(),
        ));
    }
    Ok(manifest)
}

/// Independent `<field>...</field>` extraction, case-insensitive and
/// spanning lines.
fn parse_with_patterns(text: &str) -> Manifest {
    let mut manifest = Manifest::default();
    for field in ManifestField::ALL {
        let pattern = format!("<{tag}>(.*?)</{tag}>", tag = field.tag());
        let regex = match RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        {
            Ok(regex) => regex,
            Err(e) => {
                warn!("Skipping manifest field {}: {}", field.tag(), e);
                continue;
            }
        };
        if let Some(captures) = regex.captures(text) {
            if let Some(value) = captures.get(1) {
                manifest.set(field, value.as_str());
            }
        }
    }
    manifest
}

/// Reads the manifest document stored at the root of a package archive.
///
/// Returns `Ok(None)` when the archive has no manifest or is not an archive
/// at all.
pub fn read_embedded_manifest(archive_path: &Path, file_name: &str) -> Result<Option<String>> {
    let kind = detect_archive_kind(archive_path)?;
    debug!(
        "Looking for embedded {} in {} ({:?})",
        file_name,
        archive_path.display(),
        kind
    );
    let open = || {
        File::open(archive_path).map_err(|e| {
            FlarmError::from_io(e, format!("Failed to open package {}", archive_path.display()))
        })
    };

    match kind {
        ArchiveKind::Zip => {
            let mut archive = ZipArchive::new(BufReader::new(open()?)).map_err(|e| {
                FlarmError::ArchiveCorrupt(format!("{}: {}", archive_path.display(), e))
            })?;
            let mut entry = match archive.by_name(file_name) {
                Ok(entry) => entry,
                Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                Err(e) => {
                    return Err(FlarmError::ArchiveCorrupt(format!(
                        "{}: {}",
                        archive_path.display(),
                        e
                    )))
                }
            };
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(|e| {
                FlarmError::ArchiveCorrupt(format!("{}: {}", archive_path.display(), e))
            })?;
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        ArchiveKind::Tar => find_in_tar(open()?, file_name, archive_path),
        ArchiveKind::TarGz => find_in_tar(GzDecoder::new(open()?), file_name, archive_path),
        ArchiveKind::TarBz2 => find_in_tar(BzDecoder::new(open()?), file_name, archive_path),
        ArchiveKind::TarXz => find_in_tar(XzDecoder::new(open()?), file_name, archive_path),
        ArchiveKind::Opaque => Ok(None),
    }
}

fn find_in_tar<R: Read>(reader: R, file_name: &str, archive_path: &Path) -> Result<Option<String>> {
    let corrupt = |e: std::io::Error| {
        FlarmError::ArchiveCorrupt(format!("{}: {}", archive_path.display(), e))
    };
    let mut archive = Archive::new(reader);
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let path = entry.path().map_err(corrupt)?.into_owned();
        let normal: Vec<Component<'_>> = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        let at_root = matches!(normal.as_slice(), [Component::Normal(name)] if *name == file_name);
        if at_root && entry.header().entry_type().is_file() {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(corrupt)?;
            return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    use super::*;

    const FULL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<app>
  <name>Flight Viewer</name>
  <Publisher> acme </Publisher>
  <app>viewer</app>
  <version>1.2.0</version>
  <platform>Knosthalij</platform>
  <author>alice</author>
  <icon>ignored.png</icon>
</app>"#;

    #[test]
    fn structured_document_yields_all_fields() {
        let manifest = parse_manifest(FULL);
        assert_eq!(manifest.name.as_deref(), Some("Flight Viewer"));
        assert_eq!(manifest.publisher.as_deref(), Some("acme"));
        assert_eq!(manifest.app.as_deref(), Some("viewer"));
        assert_eq!(manifest.version.as_deref(), Some("1.2.0"));
        assert_eq!(manifest.platform.as_deref(), Some("Knosthalij"));
        assert_eq!(manifest.author.as_deref(), Some("alice"));
        assert!(manifest.missing_required().is_empty());
    }

    #[test]
    fn nested_fields_are_not_direct_children() {
        let manifest = parse_manifest("<app><meta><version>9</version></meta><app>x</app></app>");
        assert_eq!(manifest.version, None);
        assert_eq!(manifest.app.as_deref(), Some("x"));
    }

    #[test]
    fn malformed_document_falls_back_to_patterns() {
        // Unescaped ampersand and an unclosed root.
        let text = "<app>\n<NAME>Tom & Jerry</NAME>\n<version>\n 2.0\n</version><publisher>acme</publisher>";
        let manifest = parse_manifest(text);
        assert_eq!(manifest.name.as_deref(), Some("Tom & Jerry"));
        assert_eq!(manifest.version.as_deref(), Some("2.0"));
        assert_eq!(manifest.publisher.as_deref(), Some("acme"));
        assert_eq!(manifest.platform, None);
    }

    #[test]
    fn garbage_yields_empty_manifest() {
        assert!(parse_manifest("not xml at all").is_empty());
        assert!(parse_manifest("").is_empty());
    }

    #[test]
    fn embedded_manifest_is_read_from_zip_root() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("viewer-1.0-win.iflapp");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("nested/details.xml", options).unwrap();
        writer.write_all(b"<app><app>wrong</app></app>").unwrap();
        writer.start_file("details.xml", options).unwrap();
        writer.write_all(FULL.as_bytes()).unwrap();
        writer.finish().unwrap();

        let text = read_embedded_manifest(&path, "details.xml").unwrap().unwrap();
        assert_eq!(parse_manifest(&text).app.as_deref(), Some("viewer"));
    }

    #[test]
    fn embedded_manifest_absent_from_plain_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readme.iflapp");
        std::fs::write(&path, b"plain bytes, not an archive").unwrap();
        assert_eq!(read_embedded_manifest(&path, "details.xml").unwrap(), None);
    }
}
