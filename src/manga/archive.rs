use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::DownloadError;

pub const CBZ_EXTENSION: &str = "cbz";

/// Packs every regular file of `source` into the zip archive `destination`.
///
/// The archive is written next to its final place with a `.part` suffix and
/// only renamed once complete, so `destination` either holds a full archive
/// or does not exist. `source` is never touched.
pub fn pack(source: &Path, destination: &Path) -> Result<PathBuf, DownloadError> {
    let mut partial = OsString::from(destination.as_os_str());
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = write_archive(source, &partial).and_then(|()| fs::rename(&partial, destination));
    match result {
        Ok(()) => {
            debug!(archive = %destination.display(), "archive written");
            Ok(destination.to_path_buf())
        }
        Err(e) => {
            if partial.exists() {
                if let Err(e) = fs::remove_file(&partial) {
                    warn!(path = %partial.display(), error = %e, "could not remove partial archive");
                }
            }
            Err(DownloadError::ArchiveFailed {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}

fn write_archive(source: &Path, partial: &Path) -> io::Result<()> {
    let mut entries = fs::read_dir(source)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.retain(|path| path.is_file());
    entries.sort();

    let mut zip = ZipWriter::new(BufWriter::new(File::create(partial)?));
    // Images are already compressed.
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for path in entries {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        zip.start_file(name, options)?;
        io::copy(&mut File::open(&path)?, &mut zip)?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    writer.get_ref().sync_all()
}
