// Path: flarm-core/src/install/extract.rs
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
#[cfg(unix)]
use std::os::unix::fs as unix_fs;
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flarm_common::error::{FlarmError, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, error, warn};
use xz2::read::XzDecoder;
use zip::read::ZipArchive;

const TAR_BLOCK: usize = 512;

/// Container format of a package payload, judged by content rather than
/// by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    /// Not a recognized archive; installed as-is.
    Opaque,
}

pub fn detect_archive_kind(path: &Path) -> Result<ArchiveKind> {
    let head = read_head(open_archive(path)?, TAR_BLOCK)
        .map_err(|e| FlarmError::from_io(e, format!("Failed to read {}", path.display())))?;

    if infer::archive::is_zip(&head) {
        return Ok(ArchiveKind::Zip);
    }
    if looks_like_tar_header(&head) {
        return Ok(ArchiveKind::Tar);
    }

    // Compressed payloads only count as archives when they hold a tarball.
    let compressed = if infer::archive::is_gz(&head) {
        Some((ArchiveKind::TarGz, peek_decompressed(GzDecoder::new(open_archive(path)?))))
    } else if infer::archive::is_bz2(&head) {
        Some((ArchiveKind::TarBz2, peek_decompressed(BzDecoder::new(open_archive(path)?))))
    } else if infer::archive::is_xz(&head) {
        Some((ArchiveKind::TarXz, peek_decompressed(XzDecoder::new(open_archive(path)?))))
    } else {
        None
    };

    match compressed {
        Some((kind, Ok(inner))) if looks_like_tar_header(&inner) => Ok(kind),
        Some((kind, Err(e))) => Err(FlarmError::ArchiveCorrupt(format!(
            "{} looks like {:?} but could not be decompressed: {}",
            path.display(),
            kind,
            e
        ))),
        _ => Ok(ArchiveKind::Opaque),
    }
}

fn open_archive(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        FlarmError::from_io(e, format!("Failed to open archive {}", path.display()))
    })
}

fn read_head<R: Read>(reader: R, len: usize) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut head)?;
    Ok(head)
}

fn peek_decompressed<R: Read>(reader: R) -> io::Result<Vec<u8>> {
    read_head(reader, TAR_BLOCK)
}

/// A POSIX `ustar` header, or an old-style header whose checksum adds up.
fn looks_like_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK {
        return false;
    }
    if infer::archive::is_tar(block) {
        return true;
    }

    let field = &block[148..156];
    let digits: String = field
        .iter()
        .map(|b| *b as char)
        .filter(|c| c.is_digit(8))
        .collect();
    let Ok(recorded) = u32::from_str_radix(&digits, 8) else {
        return false;
    };
    let computed: u32 = block[..TAR_BLOCK]
        .iter()
        .enumerate()
        .map(|(i, b)| if (148..156).contains(&i) { b' ' as u32 } else { *b as u32 })
        .sum();
    // An all-zero block sums to the eight spaces alone.
    computed != 8 * b' ' as u32 && computed == recorded
}

/// Unpacks `archive_path` into `target_dir`.
///
/// Returns `Ok(true)` when the file was a recognized archive and was fully
/// extracted, `Ok(false)` when it was not an archive and was copied into
/// `target_dir` unchanged. A recognized archive that cannot be read is an
/// [`FlarmError::ArchiveCorrupt`].
pub fn extract_archive(archive_path: &Path, target_dir: &Path) -> Result<bool> {
    fs::create_dir_all(target_dir).map_err(|e| {
        FlarmError::from_io(
            e,
            format!("Failed to create target directory {}", target_dir.display()),
        )
    })?;

    let kind = detect_archive_kind(archive_path)?;
    debug!(
        "Extracting '{}' ({:?}) to '{}'",
        archive_path.display(),
        kind,
        target_dir.display()
    );

    match kind {
        ArchiveKind::Zip => {
            let reader = BufReader::new(open_archive(archive_path)?);
            extract_zip_archive(reader, target_dir, archive_path)?;
        }
        ArchiveKind::Tar => {
            extract_tar_archive(open_archive(archive_path)?, target_dir, archive_path)?;
        }
        ArchiveKind::TarGz => {
            let tar = GzDecoder::new(open_archive(archive_path)?);
            extract_tar_archive(tar, target_dir, archive_path)?;
        }
        ArchiveKind::TarBz2 => {
            let tar = BzDecoder::new(open_archive(archive_path)?);
            extract_tar_archive(tar, target_dir, archive_path)?;
        }
        ArchiveKind::TarXz => {
            let tar = XzDecoder::new(open_archive(archive_path)?);
            extract_tar_archive(tar, target_dir, archive_path)?;
        }
        ArchiveKind::Opaque => {
            let file_name = archive_path.file_name().ok_or_else(|| {
                FlarmError::InstallError(format!(
                    "Package path {} has no file name",
                    archive_path.display()
                ))
            })?;
            let dest = target_dir.join(file_name);
            fs::copy(archive_path, &dest).map_err(|e| {
                FlarmError::from_io(
                    e,
                    format!("Failed to copy {} to {}", archive_path.display(), dest.display()),
                )
            })?;
            debug!(
                "{} is not an archive; copied verbatim to {}",
                archive_path.display(),
                dest.display()
            );
            return Ok(false);
        }
    }
    Ok(true)
}

/// Joins an archive entry path onto the target, refusing anything that
/// would land outside of it.
fn safe_join(target_dir: &Path, entry_path: &Path) -> std::result::Result<Option<PathBuf>, String> {
    let mut joined = target_dir.to_path_buf();
    let mut pushed = false;
    for comp in entry_path.components() {
        match comp {
            Component::Normal(p) => {
                joined.push(p);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!("Unsafe '..' in entry path {}", entry_path.display()))
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(format!(
                    "Disallowed component {:?} in entry path {}",
                    comp,
                    entry_path.display()
                ))
            }
        }
    }
    Ok(pushed.then_some(joined))
}

fn extract_tar_archive<R: Read>(
    reader: R,
    target_dir: &Path,
    archive_path_for_log: &Path,
) -> Result<()> {
    let corrupt = |detail: String| {
        FlarmError::ArchiveCorrupt(format!("{}: {}", archive_path_for_log.display(), detail))
    };

    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    debug!("Starting TAR extraction for {}", archive_path_for_log.display());

    let entries = archive
        .entries()
        .map_err(|e| corrupt(format!("unreadable TAR stream: {e}")))?;
    for entry_result in entries {
        let mut entry =
            entry_result.map_err(|e| corrupt(format!("error reading TAR entry: {e}")))?;
        let path_in_archive: PathBuf = entry
            .path()
            .map_err(|e| corrupt(format!("invalid path in TAR entry: {e}")))?
            .into_owned();

        let on_disk = match safe_join(target_dir, &path_in_archive) {
            Ok(Some(path)) => path,
            Ok(None) => continue,
            Err(msg) => {
                error!("{}", msg);
                return Err(corrupt(msg));
            }
        };

        match entry.unpack_in(target_dir) {
            Ok(true) => debug!("Unpacked TAR entry to: {}", on_disk.display()),
            Ok(false) => {
                return Err(corrupt(format!(
                    "entry {} escapes the extraction directory",
                    path_in_archive.display()
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(FlarmError::from_io(
                    e,
                    format!("Failed to unpack {}", on_disk.display()),
                ))
            }
            Err(e) => {
                return Err(corrupt(format!(
                    "failed to unpack entry {}: {}",
                    path_in_archive.display(),
                    e
                )))
            }
        }
    }

    debug!("Finished TAR extraction for {}", archive_path_for_log.display());
    Ok(())
}

fn extract_zip_archive<R: Read + Seek>(
    reader: R,
    target_dir: &Path,
    archive_path_for_log: &Path,
) -> Result<()> {
    let corrupt = |detail: String| {
        FlarmError::ArchiveCorrupt(format!("{}: {}", archive_path_for_log.display(), detail))
    };

    let mut archive =
        ZipArchive::new(reader).map_err(|e| corrupt(format!("failed to open ZIP: {e}")))?;
    debug!("Starting ZIP extraction for {}", archive_path_for_log.display());

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| corrupt(format!("error reading ZIP index {i}: {e}")))?;

        let path_in_archive = match file.enclosed_name() {
            Some(p) => p,
            None => {
                let msg = format!("unsafe ZIP entry name {}", file.name());
                error!("{}", msg);
                return Err(corrupt(msg));
            }
        };
        let on_disk = match safe_join(target_dir, &path_in_archive) {
            Ok(Some(path)) => path,
            Ok(None) => continue,
            Err(msg) => return Err(corrupt(msg)),
        };

        if let Some(parent) = on_disk.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FlarmError::from_io(e, format!("Failed create dir {}", parent.display()))
            })?;
        }

        if file.is_dir() {
            fs::create_dir_all(&on_disk).map_err(|e| {
                FlarmError::from_io(e, format!("Failed create dir {}", on_disk.display()))
            })?;
        } else if file.is_symlink() {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .map_err(|e| corrupt(format!("unreadable symlink entry: {e}")))?;
            let link_target = PathBuf::from(String::from_utf8_lossy(&buf).into_owned());

            #[cfg(unix)]
            {
                if on_disk.symlink_metadata().is_ok() {
                    let _ = fs::remove_file(&on_disk);
                }
                unix_fs::symlink(&link_target, &on_disk).map_err(|e| {
                    FlarmError::from_io(
                        e,
                        format!(
                            "Failed to create symlink {} -> {}",
                            on_disk.display(),
                            link_target.display()
                        ),
                    )
                })?;
            }
            #[cfg(not(unix))]
            {
                warn!(
                    "Cannot create symlink on non-unix system: {} -> {}",
                    on_disk.display(),
                    link_target.display()
                );
            }
        } else {
            if on_disk.symlink_metadata().is_ok() {
                match fs::remove_file(&on_disk) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!("Could not replace existing {}: {}", on_disk.display(), e);
                        return Err(FlarmError::from_io(
                            e,
                            format!("Failed to replace {}", on_disk.display()),
                        ));
                    }
                }
            }
            let mut out_file = File::create(&on_disk).map_err(|e| {
                FlarmError::from_io(e, format!("Failed create file {}", on_disk.display()))
            })?;
            io::copy(&mut file, &mut out_file)
                .map_err(|e| corrupt(format!("failed to inflate {}: {}", file.name(), e)))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                if !file.is_symlink() && on_disk.is_file() {
                    fs::set_permissions(&on_disk, fs::Permissions::from_mode(mode & 0o7777))?;
                }
            }
        }
    }

    debug!("Finished ZIP extraction for {}", archive_path_for_log.display());
    Ok(())
}
