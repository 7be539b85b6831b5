//! # Equivalent Stress Analysis Jobs
//!
//! Runs one [`AnalysisRequest`] end to end in a working directory that
//! holds the stress spectrum (`input.sigma`), either directly or inside an
//! `inputs.zip` archive:
//!
//! 1. Lock the working directory
//! 2. Clear outputs left by an earlier job
//! 3. Extract the input archive, if any
//! 4. Render the run script from the request's profile and write it
//! 5. Write the launcher configuration
//! 6. Submit through the batch launcher
//! 7. Wait for the job's out file
//! 8. Extract the equivalent stress (CSV for fast requests, HTML otherwise)
//!
//! The files kept for the requester are packaged into `outputs.zip`.
//!
//! Each step is reported as a `tracing` event on the `esa_core::pipeline`
//! target.
//!
//! ## Example
//!
//! ```rust,no_run
//! use esa_core::pipeline::run_equivalent_stress_analysis;
//! use esa_core::file_io::load_request;
//! use esa_core::settings::Settings;
//! use std::path::Path;
//!
//! let request = load_request(Path::new("jobs/job-1/request.esa.json"))?;
//! let settings = Settings::default().with_env_overrides();
//! let outcome = run_equivalent_stress_analysis(&request, Path::new("jobs/job-1"), &settings)?;
//! println!("equivalent stress: {}", outcome.equivalent_stress());
//! # Ok::<(), esa_core::errors::EsaError>(())
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::archive::{self, INPUT_ARCHIVE_NAME, OUTPUT_ARCHIVE_NAME};
use crate::builder::{render_script, AnalysisPlan};
use crate::errors::{EsaError, EsaResult};
use crate::file_io::{absolute_path, write_atomic, DirectoryLock};
use crate::launcher::{self, JobFiles, LauncherConfig};
use crate::request::AnalysisRequest;
use crate::results::{self, EsaOutcome};
use crate::settings::Settings;

/// Stress spectrum the job reads
pub const SIGMA_FILE_NAME: &str = "input.sigma";

/// Rendered run script
pub const RUN_SCRIPT_FILE_NAME: &str = "isamiRunScript.py";

/// Session file the run script saves
pub const SESSION_FILE_NAME: &str = "input.czm";

/// A working directory with its run script and launcher configuration
/// written, ready for submission.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub workdir: PathBuf,
    pub plan: AnalysisPlan,
    pub run_script: PathBuf,
    pub config_file: PathBuf,
}

/// Write the run script and launcher configuration for `request`.
///
/// An `inputs.zip` in `workdir` is extracted first.
pub fn prepare_job(request: &AnalysisRequest, workdir: &Path) -> EsaResult<PreparedJob> {
    let workdir = absolute_path(workdir)?;

    let inputs = workdir.join(INPUT_ARCHIVE_NAME);
    if inputs.is_file() {
        tracing::info!(job = %request.job_name(), "Extracting input archive");
        archive::extract_all(&inputs, &workdir)?;
    }

    let spectrum = workdir.join(SIGMA_FILE_NAME);
    if !spectrum.is_file() {
        return Err(EsaError::file_error(
            "open",
            spectrum.display().to_string(),
            "Cannot find input spectrum file",
        ));
    }

    tracing::info!(job = %request.job_name(), "Creating run script");
    let plan = AnalysisPlan::for_request(request, &spectrum, &workdir.join(SESSION_FILE_NAME))?;
    let run_script = workdir.join(RUN_SCRIPT_FILE_NAME);
    write_atomic(&run_script, render_script(&plan)?.as_bytes())?;

    tracing::info!(job = %request.job_name(), "Creating launcher configuration");
    let config_file = LauncherConfig::new(&request.tool, &workdir, &run_script)?.write(&workdir)?;

    Ok(PreparedJob {
        workdir,
        plan,
        run_script,
        config_file,
    })
}

/// What happened to one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub request_id: Uuid,
    pub job_name: String,
    pub workdir: PathBuf,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub result: Result<EsaOutcome, EsaError>,
    /// Files to hand back to the requester
    pub output_files: Vec<PathBuf>,
    /// `outputs.zip` holding `output_files`, if any were kept
    pub output_archive: Option<PathBuf>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_outcome(self) -> EsaResult<EsaOutcome> {
        self.result
    }
}

/// Run `request` in `workdir` and report the outcome.
///
/// Failures do not abort the report: they are stored in
/// [`JobReport::result`] along with the files left behind for diagnosis.
/// Nothing is kept when the working directory could not be locked.
pub fn run_job(request: &AnalysisRequest, workdir: &Path, settings: &Settings) -> JobReport {
    let started = Utc::now();
    let job_name = request.job_name();
    let mut files = None;

    let mut result = execute(request, workdir, settings, &mut files);
    match &result {
        Ok(outcome) => tracing::info!(
            job = %job_name,
            equivalent_stress = outcome.equivalent_stress(),
            "Analysis complete"
        ),
        Err(e) => {
            tracing::warn!(job = %job_name, code = e.error_code(), error = %e, "Analysis failed")
        }
    }

    let mut output_files = Vec::new();
    let mut output_archive = None;
    if let Some(files) = files {
        output_files = files.kept(result.is_ok());
        tracing::info!(job = %job_name, files = output_files.len(), "Packaging output files");
        match archive::package(&output_files, &workdir.join(OUTPUT_ARCHIVE_NAME)) {
            Ok(path) => output_archive = path,
            Err(e) => {
                tracing::warn!(job = %job_name, error = %e, "Cannot package output files");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
    }

    JobReport {
        request_id: request.meta.id,
        job_name,
        workdir: workdir.to_path_buf(),
        started,
        finished: Utc::now(),
        result,
        output_files,
        output_archive,
    }
}

/// Run `request` in `workdir` and return the extracted results.
pub fn run_equivalent_stress_analysis(
    request: &AnalysisRequest,
    workdir: &Path,
    settings: &Settings,
) -> EsaResult<EsaOutcome> {
    run_job(request, workdir, settings).into_outcome()
}

fn execute(
    request: &AnalysisRequest,
    workdir: &Path,
    settings: &Settings,
    files: &mut Option<JobFiles>,
) -> EsaResult<EsaOutcome> {
    request.validate()?;
    settings.validate()?;

    let job_name = request.job_name();
    tracing::info!(job = %job_name, workdir = %workdir.display(), "Locking working directory");
    let _lock = DirectoryLock::acquire(workdir, settings.user_id.as_str())?;
    launcher::clear_previous_outputs(workdir)?;
    let files = files.insert(JobFiles::in_dir(workdir));

    let job = prepare_job(request, workdir)?;

    tracing::info!(job = %job_name, launcher = %settings.launcher_command, "Analysis running");
    launcher::submit(&settings.launcher_command, &settings.launcher_args, &job.workdir)?;
    let out_file =
        launcher::wait_for_completion(&job.workdir, settings.poll_interval(), settings.timeout())?;
    files.out = Some(out_file);
    files.check_outputs()?;

    tracing::info!(job = %job_name, fast = request.fast, "Extracting analysis results");
    let profile = request.profile();
    let outcome = if request.fast {
        EsaOutcome::Fast(results::read_fast(&files.csv, profile)?)
    } else {
        EsaOutcome::Full(results::read_full(&files.html, profile)?)
    };
    Ok(outcome)
}
