//! # Analysis Requests
//!
//! An `AnalysisRequest` is what a requester hands to the job runner: which
//! material to analyse, which law, which tool release, and whether a fast
//! (CSV summary) or full (HTML report) extraction is wanted.
//!
//! Requests serialize to `.esa.json` files as human-readable JSON.
//!
//! ## Structure
//!
//! ```text
//! AnalysisRequest
//! ├── meta: RequestMetadata (version, id, requester, timestamp)
//! ├── material: MaterialSpec (name, specification, orientation, configuration)
//! ├── analysis_type: AnalysisType (Fatigue / Preffas / Linear)
//! ├── fast, apply_compression
//! └── tool: ToolRelease (version, sub-version)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use esa_core::profile::Orientation;
//! use esa_core::request::{AnalysisRequest, AnalysisType, MaterialSpec, ToolRelease};
//!
//! let material = MaterialSpec::new(
//!     "2024_T351_Plate",
//!     "AIMS03-02-004",
//!     Orientation::LT,
//!     "AFI/thickness:6-12",
//! );
//! let request = AnalysisRequest::new(
//!     "analyst",
//!     material,
//!     AnalysisType::Fatigue,
//!     ToolRelease::new("v9.2.0", "Isami_v9_2_0"),
//! );
//! assert!(request.validate().is_ok());
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EsaError, EsaResult};
use crate::profile::{Orientation, Profile, RetardationModel};

/// Current schema version for .esa.json files
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Root request container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Request metadata (version, id, requester)
    pub meta: RequestMetadata,

    /// Material to load into the session
    pub material: MaterialSpec,

    /// Law to run
    pub analysis_type: AnalysisType,

    /// Extract from the CSV summary instead of the full HTML report
    #[serde(default)]
    pub fast: bool,

    /// Propagation only: consider compressive cycles
    #[serde(default)]
    pub apply_compression: bool,

    /// Tool release to launch
    pub tool: ToolRelease,
}

impl AnalysisRequest {
    /// Create a new request with a fresh id.
    ///
    /// Fast extraction and compression are off; set the public fields to
    /// change them.
    pub fn new(
        requested_by: impl Into<String>,
        material: MaterialSpec,
        analysis_type: AnalysisType,
        tool: ToolRelease,
    ) -> Self {
        AnalysisRequest {
            meta: RequestMetadata {
                version: SCHEMA_VERSION.to_string(),
                id: Uuid::new_v4(),
                requested_by: requested_by.into(),
                created: Utc::now(),
            },
            material,
            analysis_type,
            fast: false,
            apply_compression: false,
            tool,
        }
    }

    /// Validate input parameters.
    pub fn validate(&self) -> EsaResult<()> {
        require("material.name", &self.material.name)?;
        require("material.specification", &self.material.specification)?;
        require("material.configuration", &self.material.configuration)?;
        require("tool.version", &self.tool.version)?;
        require("tool.sub_version", &self.tool.sub_version)?;

        // Values end up inside single-quoted script strings and launcher lines.
        for (field, value) in [
            ("material.name", &self.material.name),
            ("material.specification", &self.material.specification),
            ("tool.version", &self.tool.version),
            ("tool.sub_version", &self.tool.sub_version),
        ] {
            if value.contains(|c: char| c == '\n' || c == '\r') {
                return Err(EsaError::invalid_input(
                    field,
                    value.as_str(),
                    "Value must be a single line",
                ));
            }
        }

        if self.apply_compression && self.analysis_type.profile() == Profile::Fatigue {
            tracing::debug!(
                request = %self.meta.id,
                "apply_compression has no effect on fatigue analyses"
            );
        }
        Ok(())
    }

    /// Profile the analysis type maps onto
    pub fn profile(&self) -> Profile {
        self.analysis_type.profile()
    }

    /// Short job name derived from the request id
    pub fn job_name(&self) -> String {
        let simple = self.meta.id.simple().to_string();
        format!("esa_{}", &simple[..8])
    }
}

fn require(field: &str, value: &str) -> EsaResult<()> {
    if value.trim().is_empty() {
        return Err(EsaError::missing_field(field));
    }
    Ok(())
}

/// Request metadata stored in the file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Schema version (for migration compatibility)
    pub version: String,

    /// Unique request id
    pub id: Uuid,

    /// Who asked for the analysis
    pub requested_by: String,

    /// When the request was created
    pub created: DateTime<Utc>,
}

/// Material as known to the tool's material database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    /// Database name (e.g. `2024_T351_Plate`)
    pub name: String,

    /// Material specification reference (e.g. `AIMS03-02-004`)
    pub specification: String,

    /// Grain orientation the law is looked up for
    pub orientation: Orientation,

    /// Law configuration or failure mode (e.g. `AFI/thickness:6-12`)
    pub configuration: String,
}

impl MaterialSpec {
    pub fn new(
        name: impl Into<String>,
        specification: impl Into<String>,
        orientation: Orientation,
        configuration: impl Into<String>,
    ) -> Self {
        MaterialSpec {
            name: name.into(),
            specification: specification.into(),
            orientation,
            configuration: configuration.into(),
        }
    }
}

/// Kind of equivalent stress analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisType {
    /// Fatigue law
    Fatigue,
    /// Propagation law with Preffas retardation
    Preffas,
    /// Propagation law without retardation
    Linear,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 3] = [
        AnalysisType::Fatigue,
        AnalysisType::Preffas,
        AnalysisType::Linear,
    ];

    pub fn profile(&self) -> Profile {
        match self {
            AnalysisType::Fatigue => Profile::Fatigue,
            AnalysisType::Preffas | AnalysisType::Linear => Profile::Propagation,
        }
    }

    pub fn retardation(&self) -> RetardationModel {
        match self {
            AnalysisType::Preffas => RetardationModel::Preffas,
            AnalysisType::Fatigue | AnalysisType::Linear => RetardationModel::NoRetardation,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisType::Fatigue => "fatigue",
            AnalysisType::Preffas => "preffas",
            AnalysisType::Linear => "linear",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown analysis type '{s}' (expected fatigue, preffas or linear)")
            })
    }
}

/// Tool release the launcher should start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRelease {
    /// Release, written as `ISAMI_VERSION`
    pub version: String,

    /// Application passed to the launcher with `-application`
    pub sub_version: String,
}

impl ToolRelease {
    pub fn new(version: impl Into<String>, sub_version: impl Into<String>) -> Self {
        ToolRelease {
            version: version.into(),
            sub_version: sub_version.into(),
        }
    }
}
