//! # esa - Equivalent Stress Analysis CLI
//!
//! Usage:
//!     esa render fatigue --output isamiRunScript.py
//!     esa request new --material 2024_T351_Plate --specification AIMS03-02-004 \
//!         --orientation LT --configuration AFI/thickness:6-12 --analysis-type fatigue \
//!         --tool-version v9.2.0 --tool-sub-version Isami_v9_2_0 --output request.esa.json
//!     esa plan --request request.esa.json --workdir jobs/job-1
//!     esa run --request request.esa.json --workdir jobs/job-1 --inputs inputs.zip
//!     esa extract jobs/job-1/.../analysisName.html --analysis-type preffas
//!
//! Logging goes to stderr and is filtered with `RUST_LOG`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use esa_core::archive::INPUT_ARCHIVE_NAME;
use esa_core::builder::{issue_analysis, render_script, AnalysisPlan};
use esa_core::file_io::{absolute_path, load_request, save_request};
use esa_core::pipeline::{run_job, SESSION_FILE_NAME, SIGMA_FILE_NAME};
use esa_core::profile::{Orientation, Profile};
use esa_core::request::{AnalysisRequest, AnalysisType, MaterialSpec, ToolRelease};
use esa_core::results::{self, EsaOutcome};
use esa_core::session::RecordingSession;
use esa_core::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "esa", version, about = "Build and run equivalent stress analyses")]
struct Cli {
    /// Host settings file (JSON)
    #[arg(long, global = true, env = "ESA_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the run script of a literal profile
    Render {
        #[arg(value_enum)]
        profile: ProfileArg,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show the session calls a request would issue, as JSON
    Plan {
        #[arg(long)]
        request: PathBuf,

        /// Working directory the job would run in
        #[arg(long)]
        workdir: PathBuf,
    },

    /// Run a request in a working directory holding input.sigma or inputs.zip
    Run {
        #[arg(long)]
        request: PathBuf,

        #[arg(long)]
        workdir: PathBuf,

        /// Input archive to copy into the working directory first
        #[arg(long)]
        inputs: Option<PathBuf>,
    },

    /// Extract the equivalent stress from an HTML report or CSV summary
    Extract {
        file: PathBuf,

        #[arg(long)]
        analysis_type: AnalysisType,

        /// Read the file as a CSV summary (default: by extension)
        #[arg(long)]
        fast: bool,
    },

    /// Manage request files
    Request {
        #[command(subcommand)]
        command: RequestCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RequestCommand {
    /// Write a new request file
    New {
        #[arg(long)]
        material: String,

        #[arg(long)]
        specification: String,

        #[arg(long)]
        orientation: Orientation,

        #[arg(long)]
        configuration: String,

        #[arg(long)]
        analysis_type: AnalysisType,

        #[arg(long)]
        tool_version: String,

        #[arg(long)]
        tool_sub_version: String,

        /// Extract from the CSV summary
        #[arg(long)]
        fast: bool,

        /// Propagation only: consider compressive cycles
        #[arg(long)]
        apply_compression: bool,

        #[arg(long, env = "USER", default_value = "esa")]
        requested_by: String,

        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    Fatigue,
    Propagation,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Fatigue => Profile::Fatigue,
            ProfileArg::Propagation => Profile::Propagation,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "esa_core=info,esa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render { profile, output } => {
            let script = render_script(&AnalysisPlan::literal(profile.into()))?;
            emit(&script, output.as_deref())?;
        }

        Command::Plan { request, workdir } => {
            let request = load_request(&request)?;
            let workdir = absolute_path(&workdir)?;
            let plan = AnalysisPlan::for_request(
                &request,
                &workdir.join(SIGMA_FILE_NAME),
                &workdir.join(SESSION_FILE_NAME),
            )?;
            let mut session = RecordingSession::new();
            issue_analysis(&mut session, &plan)?;
            println!("{}", serde_json::to_string_pretty(session.calls())?);
        }

        Command::Run {
            request,
            workdir,
            inputs,
        } => {
            let settings = load_settings(cli.settings.as_deref())?;
            let request = load_request(&request)?;
            if let Some(inputs) = inputs {
                std::fs::create_dir_all(&workdir)
                    .with_context(|| format!("creating {}", workdir.display()))?;
                std::fs::copy(&inputs, workdir.join(INPUT_ARCHIVE_NAME))
                    .with_context(|| format!("copying {}", inputs.display()))?;
            }
            tracing::info!(
                job = %request.job_name(),
                analysis = %request.analysis_type,
                "Starting analysis"
            );

            let report = run_job(&request, &workdir, &settings);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Err(e) = report.result {
                bail!("analysis {} failed: {}", report.job_name, e);
            }
        }

        Command::Extract {
            file,
            analysis_type,
            fast,
        } => {
            let fast = fast
                || file
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            let profile = analysis_type.profile();
            let outcome = if fast {
                EsaOutcome::Fast(results::read_fast(&file, profile)?)
            } else {
                EsaOutcome::Full(results::read_full(&file, profile)?)
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::Request { command } => match command {
            RequestCommand::New {
                material,
                specification,
                orientation,
                configuration,
                analysis_type,
                tool_version,
                tool_sub_version,
                fast,
                apply_compression,
                requested_by,
                output,
            } => {
                let mut request = AnalysisRequest::new(
                    requested_by,
                    MaterialSpec::new(material, specification, orientation, configuration),
                    analysis_type,
                    ToolRelease::new(tool_version, tool_sub_version),
                );
                request.fast = fast;
                request.apply_compression = apply_compression;
                request.validate()?;
                save_request(&request, &output)?;
                tracing::info!(id = %request.meta.id, path = %output.display(), "Request written");
            }
        },
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    Ok(settings.with_env_overrides())
}

fn emit(text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "Run script written");
        }
        None => print!("{text}"),
    }
    Ok(())
}
