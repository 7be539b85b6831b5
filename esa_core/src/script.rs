//! # Run Script Rendering
//!
//! The tool executes a Python run script inside its own interpreter. A
//! [`ScriptSession`] is a [`Session`] whose calls append the equivalent
//! script statements, so issuing an analysis against it yields the script
//! text:
//!
//! ```text
//! MySession=IANewSession()
//! MySession.LoadMaterial('materialName','2024_T351_Plate','AIMS03-02-004','Referenced')
//! MySession.CreateStandaloneAnalysis2('analysisName','spectrum_analysis','',
//! [
//!    ['EO[FatigueLaw]/LawType','Enum_ToggleLawType:Fatigue Law'], # Law type
//! ]
//! ,True)
//! MySession.RunAllAnalysis()
//! MySession.Save('/work/input.czm')
//! MySession.Close()
//! ```

use std::path::Path;

use crate::errors::{EsaError, EsaResult};
use crate::session::{MaterialLoad, Session, StandaloneAnalysis};

/// Name of the session variable inside the script
const SESSION_VAR: &str = "MySession";

/// Session that renders a run script.
#[derive(Debug)]
pub struct ScriptSession {
    script: String,
    closed: bool,
}

impl Default for ScriptSession {
    fn default() -> Self {
        ScriptSession::new()
    }
}

impl ScriptSession {
    /// Start a script with a fresh session.
    pub fn new() -> Self {
        let mut script = String::new();
        script.push_str("# Spectrum analysis run script\n\n");
        script.push_str("# Open an empty session\n");
        script.push_str(&format!("{SESSION_VAR}=IANewSession()\n"));
        ScriptSession {
            script,
            closed: false,
        }
    }

    /// Script text so far
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Consume the session and return the rendered script.
    ///
    /// A script that never closes its session would leave the tool's
    /// workspace open, so this fails unless `close` was issued.
    pub fn into_script(self) -> EsaResult<String> {
        if !self.closed {
            return Err(EsaError::session_failed(
                "Close",
                "run script does not close its session",
            ));
        }
        Ok(self.script)
    }

    fn statement(&mut self, call: &str, comment: &str, text: String) -> EsaResult<()> {
        if self.closed {
            return Err(EsaError::session_failed(call, "session is closed"));
        }
        self.script.push('\n');
        self.script.push_str("# ");
        self.script.push_str(comment);
        self.script.push('\n');
        self.script.push_str(&text);
        self.script.push('\n');
        Ok(())
    }
}

impl Session for ScriptSession {
    fn load_material(&mut self, material: &MaterialLoad) -> EsaResult<()> {
        let text = format!(
            "{SESSION_VAR}.LoadMaterial({},{},{},{})",
            py_str(&material.alias),
            py_str(&material.name),
            py_str(&material.reference),
            py_str(material.source.as_str()),
        );
        self.statement("LoadMaterial", "Material creation", text)
    }

    fn create_standalone_analysis(&mut self, analysis: &StandaloneAnalysis) -> EsaResult<()> {
        let mut text = format!(
            "{SESSION_VAR}.CreateStandaloneAnalysis2({},{},{},\n[\n",
            py_str(&analysis.alias),
            py_str(&analysis.analysis_type),
            py_str(&analysis.extra),
        );
        for entry in &analysis.entries {
            text.push_str("   [");
            text.push_str(&py_str(&entry.path));
            text.push(',');
            text.push_str(&py_str(&entry.value));
            text.push(']');
            text.push(',');
            if let Some(note) = &entry.note {
                // Comments end at the line break.
                let note = note.replace(|c: char| c == '\n' || c == '\r', " ");
                text.push_str(" # ");
                text.push_str(&note);
            }
            text.push('\n');
        }
        text.push_str("]\n,");
        text.push_str(py_bool(analysis.flag));
        text.push(')');
        self.statement("CreateStandaloneAnalysis2", "Spectrum analysis creation", text)
    }

    fn run_all_analysis(&mut self) -> EsaResult<()> {
        self.statement(
            "RunAllAnalysis",
            "Run analyses",
            format!("{SESSION_VAR}.RunAllAnalysis()"),
        )
    }

    fn save(&mut self, path: &Path) -> EsaResult<()> {
        let path = path.to_str().ok_or_else(|| {
            EsaError::invalid_input(
                "save_path",
                path.display().to_string(),
                "Session path must be valid UTF-8",
            )
        })?;
        self.statement(
            "Save",
            "Saving session",
            format!("{SESSION_VAR}.Save({})", py_str(path)),
        )
    }

    fn close(&mut self) -> EsaResult<()> {
        self.statement("Close", "Close session", format!("{SESSION_VAR}.Close()"))?;
        self.closed = true;
        Ok(())
    }
}

/// Single-quoted Python string literal
fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
