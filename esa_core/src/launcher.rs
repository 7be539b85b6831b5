//! # Batch Launcher
//!
//! The tool is not started directly. A launcher configuration file is
//! written next to the run script and handed to the site's batch launcher
//! (`bsub.isami` by default), which queues the job and returns. When the job
//! finishes, the tool drops an `out_*` file in the working directory.
//!
//! ## Working directory layout
//!
//! ```text
//! <workdir>/
//! ├── inputs.zip                  input archive (optional)
//! ├── input.sigma                 stress spectrum (provided or extracted)
//! ├── isamiRunScript.py           rendered run script
//! ├── isamiConfigFile.txt         launcher configuration
//! ├── submission.log              launcher stdout + stderr
//! ├── out_<job>.out               tool log, renamed once seen
//! ├── outputs.zip                 kept files, packaged after the run
//! └── input.caesamexternalfiles/spectrum_analysis/analysisName/
//!     ├── analysisName.html       full report
//!     └── analysisName.csv        summary
//! ```

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::errors::{EsaError, EsaResult};
use crate::file_io::{absolute_path, write_atomic};
use crate::profile::{ANALYSIS_ALIAS, ANALYSIS_TYPE};
use crate::request::ToolRelease;

/// Launcher configuration file name
pub const CONFIG_FILE_NAME: &str = "isamiConfigFile.txt";

/// Launcher output log
pub const SUBMISSION_LOG: &str = "submission.log";

/// Prefix of the file the tool writes when a job ends
pub const OUT_FILE_PREFIX: &str = "out_";

/// Extension given to the out file once it has been picked up
pub const OUT_FILE_EXTENSION: &str = "out";

/// Directory the tool writes external files into, relative to the workdir
pub const EXTERNAL_FILES_DIR: &str = "input.caesamexternalfiles";

/// Contents of the launcher configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// `ISAMI_VERSION`
    pub version: String,
    /// Application passed with `-application`
    pub application: String,
    /// `JOB_NAME`
    pub job_name: String,
    /// `DATA_HOST_RESULT_DIR`, absolute
    pub result_dir: PathBuf,
    /// Run script, absolute
    pub run_script: PathBuf,
}

impl LauncherConfig {
    /// Configuration for running `run_script` from `workdir`.
    ///
    /// The job is named after the working directory.
    pub fn new(tool: &ToolRelease, workdir: &Path, run_script: &Path) -> EsaResult<Self> {
        let result_dir = absolute_path(workdir)?;
        let job_name = result_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                EsaError::invalid_input(
                    "workdir",
                    workdir.display().to_string(),
                    "Working directory has no name to use as job name",
                )
            })?;

        Ok(LauncherConfig {
            version: tool.version.clone(),
            application: tool.sub_version.clone(),
            job_name,
            result_dir,
            run_script: absolute_path(run_script)?,
        })
    }

    /// Render the configuration file text
    pub fn render(&self) -> String {
        let script = self.run_script.display();
        let mut result_dir = self.result_dir.display().to_string();
        if !result_dir.ends_with(std::path::MAIN_SEPARATOR) {
            result_dir.push(std::path::MAIN_SEPARATOR);
        }
        format!(
            "ISAMI_VERSION {}\n\
             LAUNCHER_PARAMETER -application {}\n\
             JOB_NAME {}\n\
             DATA_HOST_RESULT_DIR {}\n\
             INCLUDE {}\n\
             RUN {}\n",
            self.version, self.application, self.job_name, result_dir, script, script
        )
    }

    /// Write the configuration file into `dir`, returning its path
    pub fn write(&self, dir: &Path) -> EsaResult<PathBuf> {
        let path = dir.join(CONFIG_FILE_NAME);
        write_atomic(&path, self.render().as_bytes())?;
        Ok(path)
    }
}

/// Files a job leaves behind in its working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFiles {
    pub html: PathBuf,
    pub csv: PathBuf,
    pub log: PathBuf,
    /// Set once the out file has been picked up
    pub out: Option<PathBuf>,
}

/// Directory the tool writes the analysis report and summary into
pub fn output_dir(workdir: &Path) -> PathBuf {
    workdir
        .join(EXTERNAL_FILES_DIR)
        .join(ANALYSIS_TYPE)
        .join(ANALYSIS_ALIAS)
}

impl JobFiles {
    pub fn in_dir(workdir: &Path) -> Self {
        let outputs = output_dir(workdir);
        JobFiles {
            html: outputs.join(format!("{ANALYSIS_ALIAS}.html")),
            csv: outputs.join(format!("{ANALYSIS_ALIAS}.csv")),
            log: workdir.join(SUBMISSION_LOG),
            out: None,
        }
    }

    /// Fail unless both the report and the summary were written.
    pub fn check_outputs(&self) -> EsaResult<()> {
        if self.html.is_file() && self.csv.is_file() {
            return Ok(());
        }
        let details = match &self.out {
            Some(out) => format!(
                "no output files written. See '{}' for details",
                out.file_name().unwrap_or_default().to_string_lossy()
            ),
            None => "no output files written".to_string(),
        };
        Err(EsaError::analysis_failed(details))
    }

    /// Existing files worth handing back to the requester.
    ///
    /// The report on success; the report, launcher log, out file and summary
    /// on failure.
    pub fn kept(&self, succeeded: bool) -> Vec<PathBuf> {
        let mut candidates = vec![&self.html];
        if !succeeded {
            candidates.push(&self.log);
            if let Some(out) = &self.out {
                candidates.push(out);
            }
            candidates.push(&self.csv);
        }
        candidates
            .into_iter()
            .filter(|p| p.is_file())
            .cloned()
            .collect()
    }
}

/// Remove what an earlier job left in `workdir`.
///
/// Deletes the report/summary directory and every `out_*` file, renamed or
/// not, so that only the next job's files are picked up.
pub fn clear_previous_outputs(workdir: &Path) -> EsaResult<()> {
    let outputs = output_dir(workdir);
    if outputs.exists() {
        fs::remove_dir_all(&outputs).map_err(|e| {
            EsaError::file_error("remove", outputs.display().to_string(), e.to_string())
        })?;
        tracing::debug!(dir = %outputs.display(), "previous outputs removed");
    }

    let entries = fs::read_dir(workdir).map_err(|e| {
        EsaError::file_error("read dir", workdir.display().to_string(), e.to_string())
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with(OUT_FILE_PREFIX) && path.is_file() {
            fs::remove_file(&path).map_err(|e| {
                EsaError::file_error("remove", path.display().to_string(), e.to_string())
            })?;
            tracing::debug!(out_file = %path.display(), "previous out file removed");
        }
    }
    Ok(())
}

/// Submit the job in `workdir` through the batch launcher.
///
/// Runs `<command> <args...> isamiConfigFile.txt` with `workdir` as current
/// directory. Launcher output is appended to `submission.log`.
pub fn submit(command: &str, args: &[String], workdir: &Path) -> EsaResult<()> {
    let log_path = workdir.join(SUBMISSION_LOG);
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| EsaError::file_error("open", log_path.display().to_string(), e.to_string()))?;
    let log_err = log
        .try_clone()
        .map_err(|e| EsaError::file_error("open", log_path.display().to_string(), e.to_string()))?;

    let submission_failed = |reason: String| EsaError::SubmissionFailed {
        command: command.to_string(),
        log_file: SUBMISSION_LOG.to_string(),
        reason,
    };

    tracing::debug!(command, ?args, workdir = %workdir.display(), "submitting job");
    let status = Command::new(command)
        .args(args)
        .arg(CONFIG_FILE_NAME)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .status()
        .map_err(|e| submission_failed(e.to_string()))?;

    if !status.success() {
        return Err(submission_failed(status.to_string()));
    }
    Ok(())
}

/// Find an out file the tool has dropped in `workdir`.
///
/// Files already renamed to `.out` are skipped.
pub fn find_out_file(workdir: &Path) -> EsaResult<Option<PathBuf>> {
    let entries = fs::read_dir(workdir).map_err(|e| {
        EsaError::file_error("read dir", workdir.display().to_string(), e.to_string())
    })?;

    let suffix = format!(".{OUT_FILE_EXTENSION}");
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(OUT_FILE_PREFIX) && !name.ends_with(&suffix) && entry.path().is_file() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

/// Wait for the job in `workdir` to end.
///
/// Polls for the out file every `poll_interval`, renames it to
/// `<name>.out` and returns the new path.
pub fn wait_for_completion(
    workdir: &Path,
    poll_interval: Duration,
    timeout: Duration,
) -> EsaResult<PathBuf> {
    let started = Instant::now();
    loop {
        if let Some(found) = find_out_file(workdir)? {
            let mut renamed = found.clone().into_os_string();
            renamed.push(".");
            renamed.push(OUT_FILE_EXTENSION);
            let renamed = PathBuf::from(renamed);
            fs::rename(&found, &renamed).map_err(|e| {
                EsaError::file_error("rename", found.display().to_string(), e.to_string())
            })?;
            tracing::debug!(out_file = %renamed.display(), "job ended");
            return Ok(renamed);
        }

        if started.elapsed() >= timeout {
            return Err(EsaError::Timeout {
                waited_secs: started.elapsed().as_secs(),
                directory: workdir.display().to_string(),
            });
        }
        std::thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool() -> ToolRelease {
        ToolRelease::new("v9.2.0", "Isami_v9_2_0")
    }

    #[test]
    fn test_config_rendering() {
        let config = LauncherConfig {
            version: "v9.2.0".to_string(),
            application: "Isami_v9_2_0".to_string(),
            job_name: "job-42".to_string(),
            result_dir: PathBuf::from("/work/job-42"),
            run_script: PathBuf::from("/work/job-42/isamiRunScript.py"),
        };
        assert_eq!(
            config.render(),
            "ISAMI_VERSION v9.2.0\n\
             LAUNCHER_PARAMETER -application Isami_v9_2_0\n\
             JOB_NAME job-42\n\
             DATA_HOST_RESULT_DIR /work/job-42/\n\
             INCLUDE /work/job-42/isamiRunScript.py\n\
             RUN /work/job-42/isamiRunScript.py\n"
        );
    }

    #[test]
    fn test_config_job_name_from_directory() {
        let dir = TempDir::new().unwrap();
        let workdir = dir.path().join("job-7");
        fs::create_dir(&workdir).unwrap();
        let config =
            LauncherConfig::new(&tool(), &workdir, &workdir.join("isamiRunScript.py")).unwrap();
        assert_eq!(config.job_name, "job-7");

        let path = config.write(&workdir).unwrap();
        assert_eq!(path, workdir.join(CONFIG_FILE_NAME));
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("ISAMI_VERSION v9.2.0\n"));
        assert!(text.contains("JOB_NAME job-7\n"));
    }

    #[test]
    fn test_out_file_detection_skips_renamed_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("out_1.out"), "old").unwrap();
        fs::write(dir.path().join("input.sigma"), "").unwrap();
        assert_eq!(find_out_file(dir.path()).unwrap(), None);

        fs::write(dir.path().join("out_2"), "log").unwrap();
        assert_eq!(find_out_file(dir.path()).unwrap(), Some(dir.path().join("out_2")));
    }

    #[test]
    fn test_wait_renames_out_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("out_12345"), "done").unwrap();
        let out =
            wait_for_completion(dir.path(), Duration::from_millis(10), Duration::from_secs(1))
                .unwrap();
        assert_eq!(out, dir.path().join("out_12345.out"));
        assert!(out.is_file());
        assert!(!dir.path().join("out_12345").exists());
    }

    #[test]
    fn test_wait_times_out() {
        let dir = TempDir::new().unwrap();
        let err =
            wait_for_completion(dir.path(), Duration::from_millis(5), Duration::from_millis(20))
                .unwrap_err();
        assert_eq!(err.error_code(), "TIMEOUT");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_kept_files_depend_on_outcome() {
        let dir = TempDir::new().unwrap();
        let mut files = JobFiles::in_dir(dir.path());
        fs::create_dir_all(files.html.parent().unwrap()).unwrap();
        fs::write(&files.html, "<HTML>").unwrap();
        fs::write(&files.log, "queued").unwrap();
        let out = dir.path().join("out_9.out");
        fs::write(&out, "").unwrap();
        files.out = Some(out.clone());

        assert_eq!(files.kept(true), vec![files.html.clone()]);
        assert_eq!(files.kept(false), vec![files.html.clone(), files.log.clone(), out]);
    }

    #[test]
    fn test_missing_outputs_name_the_out_file() {
        let dir = TempDir::new().unwrap();
        let mut files = JobFiles::in_dir(dir.path());
        files.out = Some(dir.path().join("out_3.out"));
        let err = files.check_outputs().unwrap_err();
        assert!(err.to_string().contains("out_3.out"));
    }

    #[test]
    fn test_clearing_removes_earlier_job_files_only() {
        let dir = TempDir::new().unwrap();
        let files = JobFiles::in_dir(dir.path());
        fs::create_dir_all(files.html.parent().unwrap()).unwrap();
        fs::write(&files.html, "<HTML>").unwrap();
        fs::write(&files.csv, "Equivalent stress;1;MPa").unwrap();
        fs::write(dir.path().join("out_1.out"), "old").unwrap();
        fs::write(dir.path().join("out_2"), "interrupted").unwrap();
        fs::write(dir.path().join("input.sigma"), "").unwrap();
        fs::write(&files.log, "queued").unwrap();

        clear_previous_outputs(dir.path()).unwrap();

        assert!(!output_dir(dir.path()).exists());
        assert!(!dir.path().join("out_1.out").exists());
        assert_eq!(find_out_file(dir.path()).unwrap(), None);
        assert!(dir.path().join("input.sigma").is_file());
        assert!(files.log.is_file());
        assert!(dir.path().join(EXTERNAL_FILES_DIR).is_dir());
    }

    #[test]
    fn test_clearing_an_unused_workdir_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("input.sigma"), "").unwrap();
        clear_previous_outputs(dir.path()).unwrap();
        assert!(dir.path().join("input.sigma").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_launcher_is_reported() {
        let dir = TempDir::new().unwrap();
        let args = vec!["-c".to_string(), "echo refused; exit 3".to_string()];
        let err = submit("sh", &args, dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "SUBMISSION_FAILED");
        let log = fs::read_to_string(dir.path().join(SUBMISSION_LOG)).unwrap();
        assert!(log.contains("refused"));
    }
}
