//! # Configuration Entries
//!
//! A standalone analysis is configured by an ordered list of
//! `(parameter path, typed value)` pairs. Paths address an object/property
//! inside the analysis (`EO[FatigueLaw]/LawType`); values are strings of the
//! form `<type tag>:<payload>`.
//!
//! Entries are passed through to the session verbatim. The encoder
//! functions below only produce the value shapes the analysis profiles use;
//! they do not model the vendor's type system.
//!
//! ## Example
//!
//! ```rust
//! use esa_core::entry::{self, ConfigEntry};
//!
//! let law = ConfigEntry::new(
//!     "EO[FatigueLaw]/LawType",
//!     entry::enumeration("Enum_ToggleLawType", "Fatigue Law"),
//! );
//! assert_eq!(law.value, "Enum_ToggleLawType:Fatigue Law");
//! assert_eq!(law.type_tag(), "Enum_ToggleLawType");
//! ```

use serde::{Deserialize, Serialize};

/// One `(parameter path, typed value)` setting of a standalone analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Slash-delimited parameter path, optionally with bracketed type qualifiers
    pub path: String,

    /// Typed value string (`tag:payload`)
    pub value: String,

    /// Human note rendered as a trailing comment in run scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ConfigEntry {
    /// Create an entry without a note
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigEntry {
            path: path.into(),
            value: value.into(),
            note: None,
        }
    }

    /// Attach a note (builder style)
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The type tag in front of the first `:` of the value
    pub fn type_tag(&self) -> &str {
        self.value
            .split_once(':')
            .map(|(tag, _)| tag)
            .unwrap_or(&self.value)
    }

    /// Everything after the first `:` of the value
    pub fn payload(&self) -> &str {
        self.value
            .split_once(':')
            .map(|(_, payload)| payload)
            .unwrap_or("")
    }
}

// Notes are presentation only.
impl PartialEq for ConfigEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.value == other.value
    }
}

impl Eq for ConfigEntry {}

// ============================================================================
// Value encoders
// ============================================================================

/// Boolean array: `BA:TRUE:<len>::<flag;flag;...>`
pub fn bool_array(flags: &[bool]) -> String {
    let joined = flags
        .iter()
        .map(|flag| if *flag { "TRUE" } else { "FALSE" })
        .collect::<Vec<_>>()
        .join(";");
    format!("BA:TRUE:{}::{}", flags.len(), joined)
}

/// Enumeration literal: `<enum type>:<literal>`
pub fn enumeration(enum_type: &str, literal: &str) -> String {
    format!("{enum_type}:{literal}")
}

/// Object instantiation with no payload: `<object type>:`
pub fn object(object_type: &str) -> String {
    format!("{object_type}:")
}

/// File URL: `Caesam_Url:file:<path>`
pub fn file_url(path: &str) -> String {
    format!("Caesam_Url:file:{path}")
}

/// Double: `D:<value>`
pub fn double(value: f64) -> String {
    format!("D:{value}")
}

/// String: `S:<text>`
pub fn string(text: &str) -> String {
    format!("S:{text}")
}

/// Reference to a material loaded under `alias`
pub fn material_ref(alias: &str) -> String {
    format!("AirbusEO_TMaterial:{alias}")
}

/// Yes/No enumeration
pub fn yes_no(value: bool) -> String {
    enumeration("CaesamEnum_YesNo", if value { "Yes" } else { "No" })
}
