//! # Session Seam
//!
//! The analysis tool is driven through a session object with a handful of
//! calls. [`Session`] mirrors those calls one-to-one so the request builder
//! can be pointed at:
//!
//! - [`crate::script::ScriptSession`], which writes the run script the tool
//!   executes in its own interpreter
//! - [`RecordingSession`], which records the calls (dry runs, tests)
//!
//! ## Call names
//!
//! | Trait method | Tool call |
//! |--------------|-----------|
//! | `load_material` | `LoadMaterial` |
//! | `create_standalone_analysis` | `CreateStandaloneAnalysis2` |
//! | `run_all_analysis` | `RunAllAnalysis` |
//! | `save` | `Save` |
//! | `close` | `Close` |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entry::ConfigEntry;
use crate::errors::{EsaError, EsaResult};

/// Where the tool resolves a loaded material from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialSource {
    /// Material database reference
    Referenced,
}

impl MaterialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialSource::Referenced => "Referenced",
        }
    }
}

/// Arguments of `LoadMaterial`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLoad {
    /// Alias entries refer to the material by
    pub alias: String,
    /// Material database name
    pub name: String,
    /// Material specification reference
    pub reference: String,
    pub source: MaterialSource,
}

/// Arguments of `CreateStandaloneAnalysis2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandaloneAnalysis {
    /// Alias of the analysis inside the session
    pub alias: String,
    /// Analysis type (e.g. `spectrum_analysis`)
    pub analysis_type: String,
    /// Extra argument, empty for spectrum analyses
    pub extra: String,
    /// Ordered configuration entries
    pub entries: Vec<ConfigEntry>,
    /// Trailing flag, always set for spectrum analyses
    pub flag: bool,
}

/// One open analysis workspace of the tool.
pub trait Session {
    fn load_material(&mut self, material: &MaterialLoad) -> EsaResult<()>;

    fn create_standalone_analysis(&mut self, analysis: &StandaloneAnalysis) -> EsaResult<()>;

    fn run_all_analysis(&mut self) -> EsaResult<()>;

    fn save(&mut self, path: &Path) -> EsaResult<()>;

    fn close(&mut self) -> EsaResult<()>;
}

/// A call made against a [`RecordingSession`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", content = "args")]
pub enum SessionCall {
    LoadMaterial(MaterialLoad),
    CreateStandaloneAnalysis2(StandaloneAnalysis),
    RunAllAnalysis,
    Save(PathBuf),
    Close,
}

impl SessionCall {
    /// Tool-side name of the call
    pub fn name(&self) -> &'static str {
        match self {
            SessionCall::LoadMaterial(_) => "LoadMaterial",
            SessionCall::CreateStandaloneAnalysis2(_) => "CreateStandaloneAnalysis2",
            SessionCall::RunAllAnalysis => "RunAllAnalysis",
            SessionCall::Save(_) => "Save",
            SessionCall::Close => "Close",
        }
    }
}

/// Session that records every call instead of talking to the tool.
///
/// `failing_at` makes the named call fail once reached, to exercise how
/// callers handle tool-side failures.
#[derive(Debug, Default)]
pub struct RecordingSession {
    calls: Vec<SessionCall>,
    fail_at: Option<String>,
    closed: bool,
}

impl RecordingSession {
    pub fn new() -> Self {
        RecordingSession::default()
    }

    /// Fail when the call named `call` (tool-side name) is made
    pub fn failing_at(call: impl Into<String>) -> Self {
        RecordingSession {
            fail_at: Some(call.into()),
            ..RecordingSession::default()
        }
    }

    pub fn calls(&self) -> &[SessionCall] {
        &self.calls
    }

    /// Tool-side names of the recorded calls, in order
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.iter().map(SessionCall::name).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn record(&mut self, call: SessionCall) -> EsaResult<()> {
        if self.closed {
            return Err(EsaError::session_failed(call.name(), "session is closed"));
        }
        if self.fail_at.as_deref() == Some(call.name()) {
            return Err(EsaError::session_failed(call.name(), "injected failure"));
        }
        if matches!(call, SessionCall::Close) {
            self.closed = true;
        }
        self.calls.push(call);
        Ok(())
    }
}

impl Session for RecordingSession {
    fn load_material(&mut self, material: &MaterialLoad) -> EsaResult<()> {
        self.record(SessionCall::LoadMaterial(material.clone()))
    }

    fn create_standalone_analysis(&mut self, analysis: &StandaloneAnalysis) -> EsaResult<()> {
        self.record(SessionCall::CreateStandaloneAnalysis2(analysis.clone()))
    }

    fn run_all_analysis(&mut self) -> EsaResult<()> {
        self.record(SessionCall::RunAllAnalysis)
    }

    fn save(&mut self, path: &Path) -> EsaResult<()> {
        self.record(SessionCall::Save(path.to_path_buf()))
    }

    fn close(&mut self) -> EsaResult<()> {
        self.record(SessionCall::Close)
    }
}
