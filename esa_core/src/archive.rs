//! # Job Archives
//!
//! A job's inputs arrive as one zip archive (`inputs.zip`) that is unpacked
//! into the working directory before the spectrum is looked up. The files
//! kept after the run are handed back as `outputs.zip`, stored flat under
//! their file names.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::errors::{EsaError, EsaResult};

/// Input archive expected in the working directory
pub const INPUT_ARCHIVE_NAME: &str = "inputs.zip";

/// Archive the kept output files are packaged into
pub const OUTPUT_ARCHIVE_NAME: &str = "outputs.zip";

fn zip_error(operation: &str, path: &Path, e: ZipError) -> EsaError {
    EsaError::file_error(operation, path.display().to_string(), e.to_string())
}

fn io_error(operation: &str, path: &Path, e: io::Error) -> EsaError {
    EsaError::file_error(operation, path.display().to_string(), e.to_string())
}

/// Unpack every file of `archive` into `dest`, returning the written paths.
///
/// Entries whose path would land outside `dest` are rejected.
pub fn extract_all(archive: &Path, dest: &Path) -> EsaResult<Vec<PathBuf>> {
    let file = File::open(archive).map_err(|e| io_error("open", archive, e))?;
    let mut reader = ZipArchive::new(file).map_err(|e| zip_error("read archive", archive, e))?;

    let mut extracted = Vec::with_capacity(reader.len());
    for index in 0..reader.len() {
        let mut entry = reader
            .by_index(index)
            .map_err(|e| zip_error("read archive", archive, e))?;

        let target = match entry.enclosed_name() {
            Some(relative) => dest.join(relative),
            None => {
                return Err(EsaError::invalid_input(
                    "archive entry",
                    entry.name().to_string(),
                    "Entry path leaves the extraction directory",
                ))
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_error("create dir", &target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("create dir", parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| io_error("create", &target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| io_error("extract", &target, e))?;
        extracted.push(target);
    }

    tracing::debug!(
        archive = %archive.display(),
        files = extracted.len(),
        "archive extracted"
    );
    Ok(extracted)
}

/// Package `files` into `archive`, each under its file name.
///
/// An archive left by an earlier job is removed first. Returns `None` when
/// there is nothing to package.
pub fn package(files: &[PathBuf], archive: &Path) -> EsaResult<Option<PathBuf>> {
    if archive.is_file() {
        fs::remove_file(archive).map_err(|e| io_error("remove", archive, e))?;
    }
    if files.is_empty() {
        return Ok(None);
    }

    let file = File::create(archive).map_err(|e| io_error("create", archive, e))?;
    let mut writer = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                EsaError::invalid_input(
                    "output file",
                    path.display().to_string(),
                    "Output file has no name",
                )
            })?;
        let content = fs::read(path).map_err(|e| io_error("read", path, e))?;
        writer
            .start_file(name, options)
            .map_err(|e| zip_error("write archive", archive, e))?;
        writer
            .write_all(&content)
            .map_err(|e| io_error("write archive", archive, e))?;
    }
    writer
        .finish()
        .map_err(|e| zip_error("write archive", archive, e))?;

    tracing::debug!(archive = %archive.display(), files = files.len(), "outputs packaged");
    Ok(Some(archive.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_writes_nested_files() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join(INPUT_ARCHIVE_NAME);
        write_archive(
            &archive,
            &[("input.sigma", "NB_FLIGHTS 1\n"), ("notes/readme.txt", "mission A")],
        );

        let dest = dir.path().join("job");
        let written = extract_all(&archive, &dest).unwrap();
        assert_eq!(
            written,
            vec![dest.join("input.sigma"), dest.join("notes/readme.txt")]
        );
        assert_eq!(fs::read_to_string(dest.join("input.sigma")).unwrap(), "NB_FLIGHTS 1\n");
        assert_eq!(fs::read_to_string(dest.join("notes/readme.txt")).unwrap(), "mission A");
    }

    #[test]
    fn test_extract_rejects_entries_outside_destination() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join(INPUT_ARCHIVE_NAME);
        write_archive(&archive, &[("../escaped.txt", "x")]);

        let dest = dir.path().join("job");
        let err = extract_all(&archive, &dest).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_corrupt_archive_is_a_file_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join(INPUT_ARCHIVE_NAME);
        fs::write(&archive, "not a zip").unwrap();
        let err = extract_all(&archive, dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "FILE_ERROR");
    }

    #[test]
    fn test_package_stores_files_by_name() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let report = nested.join("analysisName.html");
        let log = dir.path().join("submission.log");
        fs::write(&report, "<HTML>").unwrap();
        fs::write(&log, "queued").unwrap();

        let archive = dir.path().join(OUTPUT_ARCHIVE_NAME);
        let written = package(&[report, log], &archive).unwrap();
        assert_eq!(written, Some(archive.clone()));

        let mut reader = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(reader.len(), 2);
        let mut html = String::new();
        reader
            .by_name("analysisName.html")
            .unwrap()
            .read_to_string(&mut html)
            .unwrap();
        assert_eq!(html, "<HTML>");
        assert!(reader.by_name("submission.log").is_ok());
    }

    #[test]
    fn test_package_nothing_removes_stale_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join(OUTPUT_ARCHIVE_NAME);
        fs::write(&archive, "old").unwrap();
        assert_eq!(package(&[], &archive).unwrap(), None);
        assert!(!archive.exists());
    }
}
