//! Fetches and unpacks the official CIFAR-10 binary archive.
//!
//! The archive is unpacked into a staging directory under the root and the
//! batch directory is renamed into place only once it is complete, so an
//! interrupted extraction never leaves a tree that looks usable.

use super::format::{DATA_DIR, META_FILE, RECORD_SIZE, TEST_FILE, TRAIN_FILES};
use anyhow::{bail, ensure, Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
const ARCHIVE_NAME: &str = "cifar-10-binary.tar.gz";
const CHUNK_SIZE: usize = 1 << 16;

/// Whether `root` holds a usable extracted dataset.
///
/// Every batch file must be present, non-empty and a whole number of
/// records long, and the class-name file must exist.
pub fn is_extracted(root: &Path) -> bool {
    let dir = root.join(DATA_DIR);
    dir.join(META_FILE).is_file()
        && TRAIN_FILES
            .iter()
            .chain([TEST_FILE].iter())
            .all(|file| holds_whole_records(&dir.join(file)))
}

fn holds_whole_records(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0 && meta.len() % RECORD_SIZE as u64 == 0)
        .unwrap_or(false)
}

/// Downloads the archive into `root` (unless already there) and unpacks it.
///
/// An archive that fails to unpack is deleted, so the next call fetches a
/// fresh copy instead of reusing a damaged one.
pub fn download_and_extract(url: &str, root: &Path) -> Result<()> {
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create dataset root '{}'", root.display()))?;

    let archive = root.join(ARCHIVE_NAME);
    if archive.is_file() {
        info!(archive = %archive.display(), "archive already downloaded, skipping fetch");
    } else {
        fetch(url, &archive)?;
    }

    if let Err(e) = extract(&archive, root) {
        warn!(archive = %archive.display(), "removing archive that failed to unpack");
        let _ = fs::remove_file(&archive);
        return Err(e);
    }
    Ok(())
}

/// Streams `url` into `dest` via a `.part` file that is renamed once complete.
fn fetch(url: &str, dest: &Path) -> Result<()> {
    info!(url, "downloading CIFAR-10");

    let response = ureq::get(url)
        .call()
        .with_context(|| format!("Failed to download {}", url))?;
    if response.status() != 200 {
        bail!("Download of {} failed with status: {}", url, response.status());
    }

    let total: Option<u64> = response
        .header("Content-Length")
        .and_then(|len| len.parse().ok());

    let partial = partial_path(dest);
    let written = {
        let file = File::create(&partial)
            .with_context(|| format!("Failed to create '{}'", partial.display()))?;
        let mut writer = BufWriter::new(file);
        let written = copy_with_progress(&mut response.into_reader(), &mut writer, total)
            .with_context(|| format!("Failed while downloading {}", url))?;
        writer
            .flush()
            .with_context(|| format!("Failed to write '{}'", partial.display()))?;
        written
    };

    if let Some(total) = total {
        if written != total {
            let _ = fs::remove_file(&partial);
            bail!(
                "Download of {} ended after {} of {} bytes",
                url,
                written,
                total
            );
        }
    }

    fs::rename(&partial, dest).with_context(|| {
        format!(
            "Failed to move '{}' to '{}'",
            partial.display(),
            dest.display()
        )
    })?;
    info!(bytes = written, path = %dest.display(), "download complete");
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Copies `reader` into `writer`, logging every tenth of `total` when it is known.
fn copy_with_progress(
    reader: &mut impl Read,
    writer: &mut impl Write,
    total: Option<u64>,
) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    let mut last_decile = 0;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        written += n as u64;

        if let Some(total) = total.filter(|&t| t > 0) {
            let decile = written * 10 / total;
            if decile > last_decile {
                last_decile = decile;
                info!(percent = decile * 10, bytes = written, "download progress");
            }
        }
    }
    Ok(written)
}

/// Unpacks a `.tar.gz` archive and moves its batch directory into `root`.
///
/// Any previous batch directory is replaced. On failure `root` is left as it was.
pub fn extract(archive: &Path, root: &Path) -> Result<()> {
    debug!(archive = %archive.display(), "extracting");
    let staging = tempfile::Builder::new()
        .prefix(".cifar-extract-")
        .tempdir_in(root)
        .with_context(|| format!("Failed to create a staging directory in '{}'", root.display()))?;

    let file =
        File::open(archive).with_context(|| format!("Failed to open '{}'", archive.display()))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(staging.path())
        .with_context(|| format!("Failed to extract '{}'", archive.display()))?;

    ensure!(
        is_extracted(staging.path()),
        "Archive '{}' did not contain a complete '{}' directory",
        archive.display(),
        DATA_DIR
    );

    let dest = root.join(DATA_DIR);
    if dest.exists() {
        fs::remove_dir_all(&dest)
            .with_context(|| format!("Failed to remove damaged '{}'", dest.display()))?;
    }
    fs::rename(staging.path().join(DATA_DIR), &dest)
        .with_context(|| format!("Failed to move extracted files to '{}'", dest.display()))?;
    Ok(())
}
