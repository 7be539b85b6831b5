//! # Analysis Profiles
//!
//! The two spectrum analysis configurations the host knows how to issue:
//!
//! - **Fatigue**: fatigue-law damage with a user-defined AFI
//! - **Propagation**: Elber crack-propagation law with optional Preffas
//!   retardation
//!
//! Both share the same loading sequence block (complex stress loading read
//! from a `.sigma` spectrum file) and differ only in the law block.
//!
//! [`fatigue_entries`] and [`propagation_entries`] return the literal lists
//! with their reference material, spectrum and step flags. [`entries`]
//! builds the same lists with request-specific values substituted.
//!
//! ## Example
//!
//! ```rust
//! use esa_core::profile::{self, Profile};
//!
//! let fatigue = profile::fatigue_entries();
//! assert_eq!(fatigue.len(), 14);
//! assert_eq!(fatigue[8].value, "Enum_ToggleLawType:Fatigue Law");
//! assert_eq!(Profile::Propagation.law_type(), "Propagation Law");
//! ```

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::entry::{self, ConfigEntry};
use crate::units::{Dimensionless, Megapascals, Quantity};

// ============================================================================
// Fixed names
// ============================================================================

/// Alias the material is loaded under and referenced by
pub const MATERIAL_ALIAS: &str = "materialName";

/// Alias of the standalone analysis inside the session
pub const ANALYSIS_ALIAS: &str = "analysisName";

/// Standalone analysis type
pub const ANALYSIS_TYPE: &str = "spectrum_analysis";

/// Reference spectrum used by the literal profiles
pub const LITERAL_SPECTRUM_PATH: &str =
    "/projects/a350_ima_ia_training/PRIVATE_DATA/Equinox/Isami_Tests/Fuselage_F26_MY.sigma";

/// Session file written by the literal profiles
pub const LITERAL_SESSION_PATH: &str =
    "/projects/a350_ima_ia_training/PRIVATE_DATA/Equinox/Isami_Tests/Fuselage_F26_MY.czm";

/// Extension of saved session files
pub const SESSION_FILE_EXTENSION: &str = "czm";

// ============================================================================
// Parameter paths
// ============================================================================

pub const STEP_EXECUTE: &str =
    "/CsmMbr_MapProcessParameterSet/CsmMbr_ProcessParameterMap[CaesamStd_StepProcessParameter]/Execute";

pub const LOADING_SEQUENCE_TYPE: &str = "EO[SequenceLoading]/LoadingSequenceType";
pub const COMPLEX_STRESS_LOADING: &str = "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING";
pub const SPECTRUM_URL: &str = "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/SpectrumUrl/Url";
pub const ALREADY_RAINFLOWED: &str =
    "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/AlreadyRainflowed";
pub const PEAK_MULTIPLICATIVE_COEFFICIENT: &str =
    "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/PeakMultiplicativeCoefficient";
pub const PEAK_STANDING_STRESS: &str =
    "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/PeakStandingStress";

pub const STRUCTURE_MATERIAL: &str = "EO[FatigueLaw]/StructureMaterial";
pub const LAW_TYPE: &str = "EO[FatigueLaw]/LawType";
pub const DAMAGE_CALCULATION_METHOD: &str = "EO[FatigueLaw]/DamageCalculationMethod";
pub const ORIENTATION_INIT: &str = "EO[FatigueLaw]/Orientation_init";
pub const CONFIGURATION_INIT: &str = "EO[FatigueLaw]/Configuration_init";
pub const USER_DEFINED_AFI: &str = "EO[FatigueLaw]/UserDefinedAFI";
pub const FATIGUE_LAW: &str = "EO[FatigueLaw]/FatigueLaw";
pub const PROPAGATION_LAW: &str = "EO[FatigueLaw]/PropagationLaw";
pub const ORIENTATION_PROPA: &str = "EO[FatigueLaw]/Orientation_propa";
pub const CONFIGURATION_PROPA: &str = "EO[FatigueLaw]/Configuration_propa";
pub const RETARDATION_MODEL: &str = "EO[FatigueLaw]/RetardationModel";
pub const CONSIDERED_COMPRESSION: &str = "EO[FatigueLaw]/ConsideredCompression";
pub const PROPAGATION_OMISSION: &str = "EO[FatigueLaw]/PropagationOmission";

/// User defined AFI applied by the fatigue profile
const FATIGUE_USER_DEFINED_AFI: Megapascals = Megapascals(100.0);

// ============================================================================
// Profile
// ============================================================================

/// Which law block the analysis carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Fatigue-law analysis (crack initiation)
    Fatigue,
    /// Propagation-law analysis (crack growth)
    Propagation,
}

impl Profile {
    /// Both profiles in standard order
    pub const ALL: [Profile; 2] = [Profile::Fatigue, Profile::Propagation];

    /// `Enum_ToggleLawType` literal
    pub fn law_type(&self) -> &'static str {
        match self {
            Profile::Fatigue => "Fatigue Law",
            Profile::Propagation => "Propagation Law",
        }
    }

    /// Short lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Fatigue => "fatigue",
            Profile::Propagation => "propagation",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Material orientation for the damage / propagation law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    LS,
    LT,
    SL,
    TL,
    TS,
}

impl Orientation {
    /// All orientations in the order the tool lists them
    pub const ALL: [Orientation; 5] = [
        Orientation::LS,
        Orientation::LT,
        Orientation::SL,
        Orientation::TL,
        Orientation::TS,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Orientation::LS => "LS",
            Orientation::LT => "LT",
            Orientation::SL => "SL",
            Orientation::TL => "TL",
            Orientation::TS => "TS",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Orientation::ALL
            .into_iter()
            .find(|o| o.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown orientation '{s}' (expected LS, LT, SL, TL or TS)"))
    }
}

/// Crack growth retardation model (propagation only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetardationModel {
    Preffas,
    NoRetardation,
}

impl RetardationModel {
    /// `Enum_RetardationModel` literal
    pub fn literal(&self) -> &'static str {
        match self {
            RetardationModel::Preffas => "Preffas",
            RetardationModel::NoRetardation => "None",
        }
    }
}

// ============================================================================
// Step selection
// ============================================================================

/// Which processing steps the session executes.
///
/// Encoded as a four-element boolean array in the order
/// check validity, initiation, propagation, residual strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSelection {
    pub check_validity: bool,
    pub initiation: bool,
    pub propagation: bool,
    pub residual_strength: bool,
}

impl StepSelection {
    /// Every step except residual strength (literal profiles)
    pub const fn all_but_residual_strength() -> Self {
        StepSelection {
            check_validity: true,
            initiation: true,
            propagation: true,
            residual_strength: false,
        }
    }

    /// Only the steps the profile's law needs
    pub const fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Fatigue => StepSelection {
                check_validity: true,
                initiation: true,
                propagation: false,
                residual_strength: false,
            },
            Profile::Propagation => StepSelection {
                check_validity: true,
                initiation: false,
                propagation: true,
                residual_strength: false,
            },
        }
    }

    pub fn flags(&self) -> [bool; 4] {
        [
            self.check_validity,
            self.initiation,
            self.propagation,
            self.residual_strength,
        ]
    }

    pub fn encode(&self) -> String {
        entry::bool_array(&self.flags())
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// The values that vary between one issued analysis and the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileParameters {
    /// Alias the structure material was loaded under
    pub material_alias: String,

    /// Processing steps to execute
    pub steps: StepSelection,

    /// Path to the `.sigma` stress spectrum
    pub spectrum_path: String,

    /// Material orientation for the law
    pub orientation: Orientation,

    /// Law configuration / failure mode (e.g. `AFI/thickness:6-12`)
    pub configuration: String,

    /// Propagation only
    pub retardation: RetardationModel,

    /// Propagation only: take compressive cycles into account
    pub considered_compression: bool,
}

impl ProfileParameters {
    /// Reference values of the literal profile
    pub fn literal(profile: Profile) -> Self {
        let configuration = match profile {
            Profile::Fatigue => "AFI/thickness:6-12",
            Profile::Propagation => "ELBER (AF)/thickness:0-7.5",
        };
        ProfileParameters {
            material_alias: MATERIAL_ALIAS.to_string(),
            steps: StepSelection::all_but_residual_strength(),
            spectrum_path: LITERAL_SPECTRUM_PATH.to_string(),
            orientation: Orientation::LT,
            configuration: configuration.to_string(),
            retardation: RetardationModel::Preffas,
            considered_compression: true,
        }
    }
}

/// Build the ordered entry list for `profile` with `params` substituted.
pub fn entries(profile: Profile, params: &ProfileParameters) -> Vec<ConfigEntry> {
    let mut list = Vec::with_capacity(15);
    list.push(
        ConfigEntry::new(STEP_EXECUTE, params.steps.encode())
            .with_note("Check validity; Initiation; Propagation; Residual strength"),
    );
    list.extend(sequence_loading(params));
    match profile {
        Profile::Fatigue => list.extend(fatigue_law(params)),
        Profile::Propagation => list.extend(propagation_law(params)),
    }
    list
}

/// Loading sequence block, shared by both profiles.
///
/// The loading type has to be selected before its sub-parameters.
fn sequence_loading(params: &ProfileParameters) -> Vec<ConfigEntry> {
    vec![
        ConfigEntry::new(
            LOADING_SEQUENCE_TYPE,
            entry::enumeration("Enum_LoadingSequenceType", "COMPLEX STRESS LOADING"),
        )
        .with_note("Loading sequence type"),
        ConfigEntry::new(
            COMPLEX_STRESS_LOADING,
            entry::object("AirbusEO_DSigmaComplexStressLoading"),
        )
        .with_note("Complex stress loading object"),
        ConfigEntry::new(SPECTRUM_URL, entry::file_url(&params.spectrum_path))
            .with_note("Stress spectrum file"),
        ConfigEntry::new(
            ALREADY_RAINFLOWED,
            entry::enumeration("Enum_AlreadyRainflowed", "NOT RAINFLOWED"),
        )
        .with_note("Spectrum is not rainflow counted yet"),
        ConfigEntry::new(PEAK_MULTIPLICATIVE_COEFFICIENT, Dimensionless(1.0).encode())
            .with_note("Peak multiplier"),
        ConfigEntry::new(PEAK_STANDING_STRESS, entry::double(0.0)).with_note("Peak shift"),
    ]
}

fn fatigue_law(params: &ProfileParameters) -> Vec<ConfigEntry> {
    vec![
        ConfigEntry::new(STRUCTURE_MATERIAL, entry::material_ref(&params.material_alias))
            .with_note("Structure material"),
        ConfigEntry::new(
            LAW_TYPE,
            entry::enumeration("Enum_ToggleLawType", Profile::Fatigue.law_type()),
        )
        .with_note("Law type"),
        ConfigEntry::new(
            DAMAGE_CALCULATION_METHOD,
            entry::enumeration(
                "Enum_ToggleDamageCalculationMethodGeoIndependent",
                "AFI USER DEFINED",
            ),
        )
        .with_note("Damage calculation method"),
        ConfigEntry::new(
            ORIENTATION_INIT,
            entry::enumeration("Enum_Orientation", params.orientation.code()),
        )
        .with_note("Damage law orientation (LS/LT/SL/TL/TS)"),
        ConfigEntry::new(
            CONFIGURATION_INIT,
            entry::string(&format!("Configuration:{}", params.configuration)),
        )
        .with_note("Damage law configuration or failure mode"),
        ConfigEntry::new(USER_DEFINED_AFI, FATIGUE_USER_DEFINED_AFI.encode())
            .with_note("User defined AFI"),
        ConfigEntry::new(FATIGUE_LAW, entry::enumeration("Enum_ToggleFatigueLaw", "AFI LAW"))
            .with_note("Fatigue law"),
    ]
}

fn propagation_law(params: &ProfileParameters) -> Vec<ConfigEntry> {
    vec![
        ConfigEntry::new(STRUCTURE_MATERIAL, entry::material_ref(&params.material_alias))
            .with_note("Structure material"),
        ConfigEntry::new(
            LAW_TYPE,
            entry::enumeration("Enum_ToggleLawType", Profile::Propagation.law_type()),
        )
        .with_note("Law type"),
        ConfigEntry::new(PROPAGATION_LAW, entry::enumeration("Enum_PropagationLaw", "Elber"))
            .with_note("Propagation law"),
        ConfigEntry::new(
            ORIENTATION_PROPA,
            entry::enumeration("Enum_Orientation", params.orientation.code()),
        )
        .with_note("Propagation law orientation (LS/LT/SL/TL/TS)"),
        ConfigEntry::new(
            CONFIGURATION_PROPA,
            entry::string(&format!("Configuration:{}", params.configuration)),
        )
        .with_note("Propagation law configuration"),
        ConfigEntry::new(
            RETARDATION_MODEL,
            entry::enumeration("Enum_RetardationModel", params.retardation.literal()),
        )
        .with_note("Retardation model"),
        ConfigEntry::new(CONSIDERED_COMPRESSION, entry::yes_no(params.considered_compression))
            .with_note("Considered compression"),
        ConfigEntry::new(PROPAGATION_OMISSION, entry::yes_no(false))
            .with_note("Omission for crack propagation"),
    ]
}

static FATIGUE_ENTRIES: Lazy<Vec<ConfigEntry>> =
    Lazy::new(|| entries(Profile::Fatigue, &ProfileParameters::literal(Profile::Fatigue)));

static PROPAGATION_ENTRIES: Lazy<Vec<ConfigEntry>> = Lazy::new(|| {
    entries(
        Profile::Propagation,
        &ProfileParameters::literal(Profile::Propagation),
    )
});

/// Literal fatigue-law entry list
pub fn fatigue_entries() -> &'static [ConfigEntry] {
    &FATIGUE_ENTRIES
}

/// Literal propagation-law entry list
pub fn propagation_entries() -> &'static [ConfigEntry] {
    &PROPAGATION_ENTRIES
}

/// Literal entry list for `profile`
pub fn literal_entries(profile: Profile) -> &'static [ConfigEntry] {
    match profile {
        Profile::Fatigue => fatigue_entries(),
        Profile::Propagation => propagation_entries(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_pairs(list: &[ConfigEntry]) -> Vec<(&str, &str)> {
        list.iter()
            .map(|e| (e.path.as_str(), e.value.as_str()))
            .collect()
    }

    const SEQUENCE_BLOCK: [(&str, &str); 7] = [
        (
            "/CsmMbr_MapProcessParameterSet/CsmMbr_ProcessParameterMap[CaesamStd_StepProcessParameter]/Execute",
            "BA:TRUE:4::TRUE;TRUE;TRUE;FALSE",
        ),
        (
            "EO[SequenceLoading]/LoadingSequenceType",
            "Enum_LoadingSequenceType:COMPLEX STRESS LOADING",
        ),
        (
            "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING",
            "AirbusEO_DSigmaComplexStressLoading:",
        ),
        (
            "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/SpectrumUrl/Url",
            "Caesam_Url:file:/projects/a350_ima_ia_training/PRIVATE_DATA/Equinox/Isami_Tests/Fuselage_F26_MY.sigma",
        ),
        (
            "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/AlreadyRainflowed",
            "Enum_AlreadyRainflowed:NOT RAINFLOWED",
        ),
        (
            "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/PeakMultiplicativeCoefficient",
            "CaesamQty_DIMENSIONLESS:1;none",
        ),
        (
            "EO[SequenceLoading]/EO_COMPLEX_STRESS_LOADING/PeakStandingStress",
            "D:0",
        ),
    ];

    #[test]
    fn test_fatigue_literal_list() {
        let mut expected = SEQUENCE_BLOCK.to_vec();
        expected.extend([
            ("EO[FatigueLaw]/StructureMaterial", "AirbusEO_TMaterial:materialName"),
            ("EO[FatigueLaw]/LawType", "Enum_ToggleLawType:Fatigue Law"),
            (
                "EO[FatigueLaw]/DamageCalculationMethod",
                "Enum_ToggleDamageCalculationMethodGeoIndependent:AFI USER DEFINED",
            ),
            ("EO[FatigueLaw]/Orientation_init", "Enum_Orientation:LT"),
            ("EO[FatigueLaw]/Configuration_init", "S:Configuration:AFI/thickness:6-12"),
            ("EO[FatigueLaw]/UserDefinedAFI", "CaesamQty_PRESSURE:100;MPa"),
            ("EO[FatigueLaw]/FatigueLaw", "Enum_ToggleFatigueLaw:AFI LAW"),
        ]);
        assert_eq!(as_pairs(fatigue_entries()), expected);
    }

    #[test]
    fn test_propagation_literal_list() {
        let mut expected = SEQUENCE_BLOCK.to_vec();
        expected.extend([
            ("EO[FatigueLaw]/StructureMaterial", "AirbusEO_TMaterial:materialName"),
            ("EO[FatigueLaw]/LawType", "Enum_ToggleLawType:Propagation Law"),
            ("EO[FatigueLaw]/PropagationLaw", "Enum_PropagationLaw:Elber"),
            ("EO[FatigueLaw]/Orientation_propa", "Enum_Orientation:LT"),
            (
                "EO[FatigueLaw]/Configuration_propa",
                "S:Configuration:ELBER (AF)/thickness:0-7.5",
            ),
            ("EO[FatigueLaw]/RetardationModel", "Enum_RetardationModel:Preffas"),
            ("EO[FatigueLaw]/ConsideredCompression", "CaesamEnum_YesNo:Yes"),
            ("EO[FatigueLaw]/PropagationOmission", "CaesamEnum_YesNo:No"),
        ]);
        assert_eq!(as_pairs(propagation_entries()), expected);
    }

    #[test]
    fn test_loading_type_precedes_its_sub_parameters() {
        for profile in Profile::ALL {
            let list = literal_entries(profile);
            let type_pos = list.iter().position(|e| e.path == LOADING_SEQUENCE_TYPE).unwrap();
            let object_pos = list.iter().position(|e| e.path == COMPLEX_STRESS_LOADING).unwrap();
            let first_sub = list
                .iter()
                .position(|e| e.path.starts_with(&format!("{COMPLEX_STRESS_LOADING}/")))
                .unwrap();
            assert!(type_pos < object_pos);
            assert!(object_pos < first_sub);
        }
    }

    #[test]
    fn test_substitution_only_touches_request_values() {
        let literal = propagation_entries();
        let params = ProfileParameters {
            steps: StepSelection::for_profile(Profile::Propagation),
            spectrum_path: "/work/job-1/input.sigma".to_string(),
            orientation: Orientation::TL,
            configuration: "ELBER (AF)/thickness:7.5-12".to_string(),
            retardation: RetardationModel::NoRetardation,
            considered_compression: false,
            ..ProfileParameters::literal(Profile::Propagation)
        };
        let custom = entries(Profile::Propagation, &params);
        assert_eq!(custom.len(), literal.len());

        let changed: Vec<&str> = literal
            .iter()
            .zip(&custom)
            .filter(|(a, b)| a != b)
            .map(|(a, _)| a.path.as_str())
            .collect();
        assert_eq!(
            changed,
            vec![
                STEP_EXECUTE,
                SPECTRUM_URL,
                ORIENTATION_PROPA,
                CONFIGURATION_PROPA,
                RETARDATION_MODEL,
                CONSIDERED_COMPRESSION,
            ]
        );
        assert_eq!(custom[0].value, "BA:TRUE:4::TRUE;FALSE;TRUE;FALSE");
        assert_eq!(custom[12].value, "Enum_RetardationModel:None");
    }

    #[test]
    fn test_fatigue_substitution_only_touches_request_values() {
        let literal = fatigue_entries();
        let params = ProfileParameters {
            steps: StepSelection::for_profile(Profile::Fatigue),
            spectrum_path: "/work/job-1/input.sigma".to_string(),
            orientation: Orientation::TL,
            configuration: "AFI/thickness:12-25".to_string(),
            // No retardation or compression entry in the fatigue law block
            retardation: RetardationModel::NoRetardation,
            considered_compression: false,
            ..ProfileParameters::literal(Profile::Fatigue)
        };
        let custom = entries(Profile::Fatigue, &params);
        assert_eq!(custom.len(), literal.len());

        let changed: Vec<&str> = literal
            .iter()
            .zip(&custom)
            .filter(|(a, b)| a != b)
            .map(|(a, _)| a.path.as_str())
            .collect();
        assert_eq!(
            changed,
            vec![STEP_EXECUTE, SPECTRUM_URL, ORIENTATION_INIT, CONFIGURATION_INIT]
        );
        assert_eq!(custom[0].value, "BA:TRUE:4::TRUE;TRUE;FALSE;FALSE");
        assert_eq!(custom[3].value, "Caesam_Url:file:/work/job-1/input.sigma");
        assert_eq!(custom[10].value, "Enum_Orientation:TL");
        assert_eq!(custom[11].value, "S:Configuration:AFI/thickness:12-25");
    }

    #[test]
    fn test_step_selection_per_profile() {
        assert_eq!(
            StepSelection::for_profile(Profile::Fatigue).encode(),
            "BA:TRUE:4::TRUE;TRUE;FALSE;FALSE"
        );
        assert_eq!(
            StepSelection::for_profile(Profile::Propagation).encode(),
            "BA:TRUE:4::TRUE;FALSE;TRUE;FALSE"
        );
    }

    #[test]
    fn test_orientation_parsing() {
        assert_eq!("lt".parse::<Orientation>().unwrap(), Orientation::LT);
        assert_eq!(" TS ".parse::<Orientation>().unwrap(), Orientation::TS);
        assert!("XY".parse::<Orientation>().is_err());
    }
}
