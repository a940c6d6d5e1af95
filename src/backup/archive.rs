use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::ArchiveError;

/// Packages `source_file` into a zip archive at `archive_path` (one entry,
/// named after the source's base name), then deletes `source_file`.
///
/// The archive is written to a temporary file in the destination directory
/// and renamed into place once fully written, so `archive_path` never exists
/// as a corrupt partial. On any failure the temporary file is removed and
/// `source_file` is left intact; the source is deleted only after the archive
/// is in place.
pub fn package_and_replace(source_file: &Path, archive_path: &Path) -> Result<(), ArchiveError> {
    let entry_name = source_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ArchiveError::BadSourceName(source_file.to_path_buf()))?;

    let dest_dir = archive_path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dest_dir)?;

    let staging = NamedTempFile::new_in(dest_dir)?;
    let mut writer = ZipWriter::new(staging.reopen()?);
    writer.start_file(
        entry_name,
        FileOptions::default().compression_method(CompressionMethod::Deflated),
    )?;
    let mut source = File::open(source_file)?;
    io::copy(&mut source, &mut writer)?;
    writer.finish()?;

    staging
        .persist(archive_path)
        .map_err(|err| ArchiveError::Persist {
            path: archive_path.to_path_buf(),
            source: err.error,
        })?;

    fs::remove_file(source_file)?;
    Ok(())
}
