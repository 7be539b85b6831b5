//! # File I/O Module
//!
//! Handles job and request file operations with safety features:
//! - **Atomic writes**: Write to .tmp, sync, rename so the tool never picks
//!   up a half-written run script or launcher configuration
//! - **Directory locking**: One job per working directory, even across hosts
//!   sharing the drive
//! - **Version validation**: Ensure request schema compatibility
//!
//! ## File Format
//!
//! Requests are saved as `.esa.json` files containing JSON. A locked working
//! directory holds a `.esa.lock` file with metadata about who holds the lock.
//!
//! ## Example
//!
//! ```rust,no_run
//! use esa_core::file_io::{save_request, load_request, DirectoryLock};
//! use esa_core::profile::Orientation;
//! use esa_core::request::{AnalysisRequest, AnalysisType, MaterialSpec, ToolRelease};
//! use std::path::Path;
//!
//! let material = MaterialSpec::new(
//!     "2024_T351_Plate",
//!     "AIMS03-02-004",
//!     Orientation::LT,
//!     "AFI/thickness:6-12",
//! );
//! let tool = ToolRelease::new("v9.2.0", "Isami_v9_2_0");
//! let request = AnalysisRequest::new("analyst", material, AnalysisType::Fatigue, tool);
//!
//! // Lock the working directory for the duration of the job
//! let lock = DirectoryLock::acquire(Path::new("jobs/job-1"), "analyst").unwrap();
//!
//! save_request(&request, Path::new("jobs/job-1/request.esa.json")).unwrap();
//! let loaded = load_request(Path::new("jobs/job-1/request.esa.json")).unwrap();
//!
//! // Lock is released when dropped
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::errors::{EsaError, EsaResult};
use crate::request::{AnalysisRequest, SCHEMA_VERSION};

/// Lock file name inside a locked working directory
pub const LOCK_FILE_NAME: &str = ".esa.lock";

/// Locks older than this are taken over
const STALE_LOCK_HOURS: i64 = 24;

/// Lock file metadata stored in `.esa.lock` files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// User identifier (email or username)
    pub user_id: String,
    /// Machine name where lock was acquired
    pub machine: String,
    /// Process ID that holds the lock
    pub pid: u32,
    /// When the lock was acquired
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    /// Create new lock info for the current process
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::env::var("HOST").ok())
    }
}

/// Working directory lock guard that releases the lock when dropped.
///
/// Uses both:
/// 1. OS-level file locking (via fs2) for process safety
/// 2. `.esa.lock` file with metadata for visibility to other hosts
#[derive(Debug)]
pub struct DirectoryLock {
    directory: PathBuf,
    lock_path: PathBuf,
    /// Keeps the OS lock
    _lock_file: File,
    pub info: LockInfo,
}

impl DirectoryLock {
    /// Acquire an exclusive lock on a working directory.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Returns
    ///
    /// * `Ok(DirectoryLock)` - Lock acquired successfully
    /// * `Err(EsaError::FileLocked)` - Another process holds the lock
    pub fn acquire(directory: &Path, user_id: impl Into<String>) -> EsaResult<Self> {
        fs::create_dir_all(directory).map_err(|e| {
            EsaError::file_error("create dir", directory.display().to_string(), e.to_string())
        })?;

        let lock_path = directory.join(LOCK_FILE_NAME);
        let info = LockInfo::new(user_id);

        if let Some(existing) = Self::check(directory) {
            return Err(EsaError::file_locked(
                directory.display().to_string(),
                format!("{} ({})", existing.user_id, existing.machine),
                existing.locked_at.to_rfc3339(),
            ));
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| {
                EsaError::file_error("create lock", lock_path.display().to_string(), e.to_string())
            })?;

        // Non-blocking
        lock_file.try_lock_exclusive().map_err(|_| {
            EsaError::file_locked(
                directory.display().to_string(),
                "another process",
                "unknown",
            )
        })?;

        let lock_json = serde_json::to_string_pretty(&info)?;
        lock_file.write_all(lock_json.as_bytes()).map_err(|e| {
            EsaError::file_error("write lock", lock_path.display().to_string(), e.to_string())
        })?;
        lock_file.sync_all().map_err(|e| {
            EsaError::file_error("sync lock", lock_path.display().to_string(), e.to_string())
        })?;

        tracing::debug!(
            directory = %directory.display(),
            user = %info.user_id,
            "working directory locked"
        );
        Ok(DirectoryLock {
            directory: directory.to_path_buf(),
            lock_path,
            _lock_file: lock_file,
            info,
        })
    }

    /// Check if a directory is locked without acquiring the lock.
    ///
    /// Returns `Some(LockInfo)` if locked, `None` if available.
    pub fn check(directory: &Path) -> Option<LockInfo> {
        let lock_path = directory.join(LOCK_FILE_NAME);
        let contents = fs::read_to_string(lock_path).ok()?;
        let info: LockInfo = serde_json::from_str(&contents).ok()?;
        if is_lock_stale(&info) {
            return None;
        }
        Some(info)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// A lock is stale when its process is gone (same machine) or it is old.
fn is_lock_stale(info: &LockInfo) -> bool {
    if let Some(our_machine) = hostname() {
        if info.machine == our_machine {
            #[cfg(windows)]
            {
                use std::process::Command;
                let output = Command::new("tasklist")
                    .args(["/FI", &format!("PID eq {}", info.pid), "/NH"])
                    .output();
                if let Ok(output) = output {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    if stdout.contains("No tasks") || !stdout.contains(&info.pid.to_string()) {
                        return true;
                    }
                }
            }
            #[cfg(unix)]
            {
                if fs::metadata(format!("/proc/{}", info.pid)).is_err() {
                    return true;
                }
            }
        }
    }

    let age = Utc::now() - info.locked_at;
    age.num_hours() > STALE_LOCK_HOURS
}

/// Write `contents` to `path` with atomic write semantics.
///
/// 1. Write to a temporary file next to `path` (`<name>.tmp`)
/// 2. Sync to disk (fsync)
/// 3. Rename over `path` (atomic on most filesystems)
pub fn write_atomic(path: &Path, contents: &[u8]) -> EsaResult<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut tmp_file = File::create(&tmp_path).map_err(|e| {
        EsaError::file_error("create temp file", tmp_path.display().to_string(), e.to_string())
    })?;
    tmp_file.write_all(contents).map_err(|e| {
        EsaError::file_error("write temp file", tmp_path.display().to_string(), e.to_string())
    })?;
    tmp_file.sync_all().map_err(|e| {
        EsaError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        EsaError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    Ok(())
}

/// Save a request as pretty JSON with atomic write semantics.
pub fn save_request(request: &AnalysisRequest, path: &Path) -> EsaResult<()> {
    let json = serde_json::to_string_pretty(request)?;
    write_atomic(path, json.as_bytes())
}

/// Load a request from a file.
///
/// # Returns
///
/// * `Ok(AnalysisRequest)` - Successfully loaded request
/// * `Err(EsaError::VersionMismatch)` - File version is incompatible
/// * `Err(EsaError::SerializationError)` - Invalid JSON
/// * `Err(EsaError::FileError)` - I/O error
pub fn load_request(path: &Path) -> EsaResult<AnalysisRequest> {
    let contents = fs::read_to_string(path)
        .map_err(|e| EsaError::file_error("read", path.display().to_string(), e.to_string()))?;

    let request: AnalysisRequest =
        serde_json::from_str(&contents).map_err(|e| EsaError::SerializationError {
            reason: format!("Invalid JSON in {}: {}", path.display(), e),
        })?;

    validate_version(&request.meta.version)?;
    Ok(request)
}

/// Validate that a file version is compatible with the current schema.
fn validate_version(file_version: &str) -> EsaResult<()> {
    let mismatch = || EsaError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    let file_parts: Vec<u32> = file_version
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect();
    let current_parts: Vec<u32> = SCHEMA_VERSION
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect();

    if file_parts.is_empty() || current_parts.is_empty() {
        return Err(mismatch());
    }

    // Major version must match
    if file_parts[0] != current_parts[0] {
        return Err(mismatch());
    }

    // For 0.x versions, a newer minor is not readable
    if current_parts[0] == 0
        && file_parts.len() > 1
        && current_parts.len() > 1
        && file_parts[1] > current_parts[1]
    {
        return Err(mismatch());
    }

    Ok(())
}

/// `path` made absolute against the current directory.
///
/// Unlike `canonicalize`, the path does not need to exist yet.
pub fn absolute_path(path: &Path) -> EsaResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| {
        EsaError::file_error("current dir", path.display().to_string(), e.to_string())
    })?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Orientation;
    use crate::request::{AnalysisType, MaterialSpec, ToolRelease};
    use tempfile::TempDir;

    fn sample_request() -> AnalysisRequest {
        AnalysisRequest::new(
            "Test Analyst",
            MaterialSpec::new(
                "2024_T351_Plate",
                "AIMS03-02-004",
                Orientation::LT,
                "AFI/thickness:6-12",
            ),
            AnalysisType::Fatigue,
            ToolRelease::new("v9.2.0", "Isami_v9_2_0"),
        )
    }

    #[test]
    fn test_lock_info_creation() {
        let info = LockInfo::new("test@example.com");
        assert_eq!(info.user_id, "test@example.com");
        assert!(info.pid > 0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("request.esa.json");

        let request = sample_request();
        save_request(&request, &path).unwrap();

        let loaded = load_request(&path).unwrap();
        assert_eq!(loaded.meta.id, request.meta.id);
        assert_eq!(loaded.meta.requested_by, "Test Analyst");
        assert_eq!(loaded.material, request.material);
    }

    #[test]
    fn test_atomic_write_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isamiRunScript.py");

        write_atomic(&path, b"MySession=IANewSession()\n").unwrap();

        assert!(!dir.path().join("isamiRunScript.py.tmp").exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "MySession=IANewSession()\n");
    }

    #[test]
    fn test_directory_lock_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let workdir = dir.path().join("job-1");

        let lock = DirectoryLock::acquire(&workdir, "test@example.com").unwrap();
        assert_eq!(lock.info.user_id, "test@example.com");
        assert_eq!(lock.directory(), workdir.as_path());

        let lock_path = workdir.join(LOCK_FILE_NAME);
        assert!(lock_path.exists());

        drop(lock);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_old_lock_is_stale() {
        let dir = TempDir::new().unwrap();
        let mut info = LockInfo::new("someone");
        info.machine = "other-host".to_string();
        info.locked_at = Utc::now() - chrono::Duration::hours(STALE_LOCK_HOURS + 1);
        fs::write(
            dir.path().join(LOCK_FILE_NAME),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();

        assert!(DirectoryLock::check(dir.path()).is_none());
        assert!(DirectoryLock::acquire(dir.path(), "me").is_ok());
    }

    #[test]
    fn test_fresh_foreign_lock_blocks() {
        let dir = TempDir::new().unwrap();
        let mut info = LockInfo::new("someone");
        info.machine = "other-host".to_string();
        fs::write(
            dir.path().join(LOCK_FILE_NAME),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();

        let err = DirectoryLock::acquire(dir.path(), "me").unwrap_err();
        assert_eq!(err.error_code(), "FILE_LOCKED");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version(SCHEMA_VERSION).is_ok());
        assert!(validate_version("0.1.0").is_ok());
        assert!(validate_version("0.1.5").is_ok());
        assert!(validate_version("1.0.0").is_err());
        assert!(validate_version("0.2.0").is_err());
        assert!(validate_version("draft").is_err());
    }

    #[test]
    fn test_load_rejects_newer_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("request.esa.json");
        let mut request = sample_request();
        request.meta.version = "0.9.0".to_string();
        save_request(&request, &path).unwrap();

        assert_eq!(load_request(&path).unwrap_err().error_code(), "VERSION_MISMATCH");
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_path() {
        assert_eq!(absolute_path(Path::new("/a/b")).unwrap(), PathBuf::from("/a/b"));
        let relative = absolute_path(Path::new("job")).unwrap();
        assert!(relative.is_absolute());
        assert!(relative.ends_with("job"));
    }
}
