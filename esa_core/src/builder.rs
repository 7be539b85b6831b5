//! # Analysis Request Builder
//!
//! An [`AnalysisPlan`] holds everything one spectrum analysis needs from the
//! session: the material to load, the standalone analysis with its ordered
//! entries, and where to save the session. [`issue_analysis`] replays a plan
//! against any [`Session`] in the one order the tool accepts:
//!
//! ```text
//! LoadMaterial → CreateStandaloneAnalysis2 → RunAllAnalysis → Save → Close
//! ```
//!
//! The first failing call aborts the sequence and its error is returned
//! unchanged. `Close` is not issued in that case.
//!
//! ## Example
//!
//! ```rust
//! use esa_core::builder::{issue_analysis, AnalysisPlan};
//! use esa_core::profile::Profile;
//! use esa_core::session::RecordingSession;
//!
//! let plan = AnalysisPlan::literal(Profile::Fatigue);
//! let mut session = RecordingSession::new();
//! issue_analysis(&mut session, &plan).unwrap();
//! assert_eq!(
//!     session.call_names(),
//!     vec!["LoadMaterial", "CreateStandaloneAnalysis2", "RunAllAnalysis", "Save", "Close"]
//! );
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entry::ConfigEntry;
use crate::errors::{EsaError, EsaResult};
use crate::profile::{
    self, Profile, ProfileParameters, StepSelection, ANALYSIS_ALIAS, ANALYSIS_TYPE,
    LITERAL_SESSION_PATH, MATERIAL_ALIAS,
};
use crate::request::AnalysisRequest;
use crate::script::ScriptSession;
use crate::session::{MaterialLoad, MaterialSource, Session, StandaloneAnalysis};

/// Reference material of the literal profiles
pub const LITERAL_MATERIAL_NAME: &str = "2024_T351_Plate";

/// Specification of the literal reference material
pub const LITERAL_MATERIAL_SPECIFICATION: &str = "AIMS03-02-004";

/// One fully specified analysis, ready to be issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPlan {
    /// Which law block the entries carry
    pub profile: Profile,

    /// `LoadMaterial` arguments
    pub material: MaterialLoad,

    /// `CreateStandaloneAnalysis2` arguments
    pub analysis: StandaloneAnalysis,

    /// Where `Save` writes the session
    pub save_path: PathBuf,
}

impl AnalysisPlan {
    /// The fixed plan of a literal profile.
    pub fn literal(profile: Profile) -> Self {
        AnalysisPlan {
            profile,
            material: MaterialLoad {
                alias: MATERIAL_ALIAS.to_string(),
                name: LITERAL_MATERIAL_NAME.to_string(),
                reference: LITERAL_MATERIAL_SPECIFICATION.to_string(),
                source: MaterialSource::Referenced,
            },
            analysis: standalone(profile::literal_entries(profile).to_vec()),
            save_path: PathBuf::from(LITERAL_SESSION_PATH),
        }
    }

    /// Plan for a request.
    ///
    /// The literal profile of the request's analysis type is used as a
    /// template: material, step flags, spectrum, orientation, configuration,
    /// retardation and compression are substituted, every other entry is
    /// kept as is.
    ///
    /// `spectrum` and `session_file` should be absolute; the tool resolves
    /// them from its own working directory.
    pub fn for_request(
        request: &AnalysisRequest,
        spectrum: &Path,
        session_file: &Path,
    ) -> EsaResult<Self> {
        request.validate()?;

        let spectrum_path = spectrum.to_str().ok_or_else(|| {
            EsaError::invalid_input(
                "spectrum",
                spectrum.display().to_string(),
                "Spectrum path must be valid UTF-8",
            )
        })?;

        let profile = request.profile();
        let params = ProfileParameters {
            material_alias: MATERIAL_ALIAS.to_string(),
            steps: StepSelection::for_profile(profile),
            spectrum_path: spectrum_path.to_string(),
            orientation: request.material.orientation,
            configuration: request.material.configuration.clone(),
            retardation: request.analysis_type.retardation(),
            considered_compression: request.apply_compression,
        };

        Ok(AnalysisPlan {
            profile,
            material: MaterialLoad {
                alias: MATERIAL_ALIAS.to_string(),
                name: request.material.name.clone(),
                reference: request.material.specification.clone(),
                source: MaterialSource::Referenced,
            },
            analysis: standalone(profile::entries(profile, &params)),
            save_path: session_file.to_path_buf(),
        })
    }

    /// Alias the analysis entries reference the structure material by
    pub fn structure_material_alias(&self) -> Option<&str> {
        self.analysis
            .entries
            .iter()
            .find(|e| e.path == profile::STRUCTURE_MATERIAL)
            .map(|e| e.payload())
    }
}

fn standalone(entries: Vec<ConfigEntry>) -> StandaloneAnalysis {
    StandaloneAnalysis {
        alias: ANALYSIS_ALIAS.to_string(),
        analysis_type: ANALYSIS_TYPE.to_string(),
        extra: String::new(),
        entries,
        flag: true,
    }
}

/// Issue `plan` against `session`.
pub fn issue_analysis<S: Session + ?Sized>(session: &mut S, plan: &AnalysisPlan) -> EsaResult<()> {
    tracing::debug!(
        profile = %plan.profile,
        material = %plan.material.name,
        entries = plan.analysis.entries.len(),
        "issuing analysis"
    );
    session.load_material(&plan.material)?;
    session.create_standalone_analysis(&plan.analysis)?;
    session.run_all_analysis()?;
    session.save(&plan.save_path)?;
    session.close()?;
    tracing::debug!(save_path = %plan.save_path.display(), "analysis issued");
    Ok(())
}

/// Render `plan` as the run script the tool executes.
pub fn render_script(plan: &AnalysisPlan) -> EsaResult<String> {
    let mut session = ScriptSession::new();
    issue_analysis(&mut session, plan)?;
    session.into_script()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Orientation, RETARDATION_MODEL, SPECTRUM_URL, STEP_EXECUTE};
    use crate::request::{AnalysisType, MaterialSpec, ToolRelease};
    use crate::session::RecordingSession;

    fn request(analysis_type: AnalysisType) -> AnalysisRequest {
        AnalysisRequest::new(
            "analyst",
            MaterialSpec::new(
                "7075_T7351_Plate",
                "AIMS03-02-022",
                Orientation::TL,
                "ELBER (AF)/thickness:7.5-12",
            ),
            analysis_type,
            ToolRelease::new("v9.2.0", "Isami_v9_2_0"),
        )
    }

    fn value_of<'a>(plan: &'a AnalysisPlan, path: &str) -> &'a str {
        plan.analysis
            .entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.value.as_str())
            .unwrap()
    }

    #[test]
    fn test_literal_plan_arguments() {
        let plan = AnalysisPlan::literal(Profile::Propagation);
        assert_eq!(plan.material.alias, "materialName");
        assert_eq!(plan.material.name, "2024_T351_Plate");
        assert_eq!(plan.material.reference, "AIMS03-02-004");
        assert_eq!(plan.material.source, MaterialSource::Referenced);
        assert_eq!(plan.analysis.alias, "analysisName");
        assert_eq!(plan.analysis.analysis_type, "spectrum_analysis");
        assert_eq!(plan.analysis.extra, "");
        assert!(plan.analysis.flag);
        assert_eq!(plan.analysis.entries.len(), 15);
        assert_eq!(plan.save_path, Path::new(LITERAL_SESSION_PATH));
    }

    #[test]
    fn test_request_plan_substitutes_request_values() {
        let mut req = request(AnalysisType::Linear);
        req.apply_compression = false;
        let plan = AnalysisPlan::for_request(
            &req,
            Path::new("/work/job/input.sigma"),
            Path::new("/work/job/input.czm"),
        )
        .unwrap();

        assert_eq!(plan.profile, Profile::Propagation);
        assert_eq!(plan.material.name, "7075_T7351_Plate");
        assert_eq!(plan.material.reference, "AIMS03-02-022");
        assert_eq!(value_of(&plan, STEP_EXECUTE), "BA:TRUE:4::TRUE;FALSE;TRUE;FALSE");
        assert_eq!(value_of(&plan, SPECTRUM_URL), "Caesam_Url:file:/work/job/input.sigma");
        assert_eq!(value_of(&plan, RETARDATION_MODEL), "Enum_RetardationModel:None");
        assert_eq!(
            value_of(&plan, profile::CONSIDERED_COMPRESSION),
            "CaesamEnum_YesNo:No"
        );
        assert_eq!(value_of(&plan, profile::ORIENTATION_PROPA), "Enum_Orientation:TL");
        assert_eq!(plan.save_path, Path::new("/work/job/input.czm"));
    }

    #[test]
    fn test_fatigue_request_plan_uses_fatigue_steps() {
        let plan = AnalysisPlan::for_request(
            &request(AnalysisType::Fatigue),
            Path::new("/w/input.sigma"),
            Path::new("/w/input.czm"),
        )
        .unwrap();
        assert_eq!(plan.analysis.entries.len(), 14);
        assert_eq!(value_of(&plan, STEP_EXECUTE), "BA:TRUE:4::TRUE;TRUE;FALSE;FALSE");
    }

    #[test]
    fn test_fatigue_request_plan_keeps_other_entries_literal() {
        let mut req = request(AnalysisType::Fatigue);
        req.apply_compression = true;
        let plan = AnalysisPlan::for_request(
            &req,
            Path::new("/work/job/input.sigma"),
            Path::new("/work/job/input.czm"),
        )
        .unwrap();
        let literal = AnalysisPlan::literal(Profile::Fatigue);

        assert_eq!(plan.material.alias, literal.material.alias);
        assert_eq!(plan.material.name, "7075_T7351_Plate");
        assert_eq!(plan.material.reference, "AIMS03-02-022");
        assert_eq!(plan.save_path, Path::new("/work/job/input.czm"));
        assert_ne!(plan.save_path, literal.save_path);

        let changed: Vec<&str> = literal
            .analysis
            .entries
            .iter()
            .zip(&plan.analysis.entries)
            .filter(|(a, b)| a != b)
            .map(|(a, _)| a.path.as_str())
            .collect();
        assert_eq!(
            changed,
            vec![
                STEP_EXECUTE,
                SPECTRUM_URL,
                profile::ORIENTATION_INIT,
                profile::CONFIGURATION_INIT,
            ]
        );
        assert_eq!(value_of(&plan, profile::ORIENTATION_INIT), "Enum_Orientation:TL");
        assert_eq!(
            value_of(&plan, profile::CONFIGURATION_INIT),
            "S:Configuration:ELBER (AF)/thickness:7.5-12"
        );
        assert_eq!(plan.structure_material_alias(), Some("materialName"));
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let mut req = request(AnalysisType::Preffas);
        req.material.specification = String::new();
        let err = AnalysisPlan::for_request(
            &req,
            Path::new("/w/input.sigma"),
            Path::new("/w/input.czm"),
        )
        .unwrap_err();
        assert_eq!(err, EsaError::missing_field("material.specification"));
    }

    #[test]
    fn test_failure_stops_sequence_without_close() {
        let plan = AnalysisPlan::literal(Profile::Fatigue);
        let mut session = RecordingSession::failing_at("RunAllAnalysis");
        let err = issue_analysis(&mut session, &plan).unwrap_err();
        assert_eq!(err, EsaError::session_failed("RunAllAnalysis", "injected failure"));
        assert_eq!(session.call_names(), vec!["LoadMaterial", "CreateStandaloneAnalysis2"]);
        assert!(!session.is_closed());
    }

    #[test]
    fn test_rendered_script_statement_order() {
        let script = render_script(&AnalysisPlan::literal(Profile::Fatigue)).unwrap();
        let positions: Vec<usize> = [
            "MySession=IANewSession()",
            "MySession.LoadMaterial(",
            "MySession.CreateStandaloneAnalysis2(",
            "MySession.RunAllAnalysis()",
            "MySession.Save('/projects/a350_ima_ia_training/PRIVATE_DATA/Equinox/Isami_Tests/Fuselage_F26_MY.czm')",
            "MySession.Close()",
        ]
        .iter()
        .map(|needle| script.find(needle).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(script.contains("['EO[FatigueLaw]/UserDefinedAFI','CaesamQty_PRESSURE:100;MPa'],"));
    }

    #[test]
    fn test_structure_material_alias_matches_loaded_alias() {
        for profile in Profile::ALL {
            let plan = AnalysisPlan::literal(profile);
            assert_eq!(plan.structure_material_alias(), Some(plan.material.alias.as_str()));
        }
    }
}
