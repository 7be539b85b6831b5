//! # esa_core - Equivalent Stress Analysis Runner
//!
//! `esa_core` builds spectrum analysis configurations for an external
//! fatigue / crack-propagation tool, issues them through the tool's session
//! API and extracts the resulting equivalent stress. All computation happens
//! inside the tool; this crate assembles what it is told and reads back what
//! it reports.
//!
//! ## Design Philosophy
//!
//! - **Literal profiles**: The fatigue and propagation entry lists are fixed
//!   tables, reproduced exactly
//! - **One seam**: Everything that talks to the tool goes through the
//!   [`session::Session`] trait
//! - **JSON-First**: Requests, results and errors implement Serialize/Deserialize
//! - **Rich Errors**: Structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use esa_core::builder::{render_script, AnalysisPlan};
//! use esa_core::profile::Profile;
//!
//! let script = render_script(&AnalysisPlan::literal(Profile::Propagation)).unwrap();
//! assert!(script.contains("MySession.RunAllAnalysis()"));
//! ```
//!
//! ## Modules
//!
//! - [`entry`] - Configuration entries and value encoders
//! - [`units`] - Physical quantity wrappers
//! - [`profile`] - Fatigue and propagation entry lists
//! - [`request`] - Analysis requests and metadata
//! - [`session`] - Session trait and call recording
//! - [`script`] - Run script rendering
//! - [`builder`] - Analysis plans and the issuing sequence
//! - [`launcher`] - Batch launcher configuration, submission and completion
//! - [`results`] - Equivalent stress extraction
//! - [`archive`] - Input and output archives
//! - [`pipeline`] - End-to-end jobs
//! - [`settings`] - Host settings
//! - [`errors`] - Structured error types
//! - [`file_io`] - Atomic writes, directory locking, request files

pub mod archive;
pub mod builder;
pub mod entry;
pub mod errors;
pub mod file_io;
pub mod launcher;
pub mod pipeline;
pub mod profile;
pub mod request;
pub mod results;
pub mod script;
pub mod session;
pub mod settings;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use builder::{issue_analysis, AnalysisPlan};
pub use errors::{EsaError, EsaResult};
pub use pipeline::{run_equivalent_stress_analysis, JobReport};
pub use profile::Profile;
pub use request::{AnalysisRequest, AnalysisType};
pub use results::EsaOutcome;
pub use session::Session;
pub use settings::Settings;
