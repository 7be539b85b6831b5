//! # Unit Types
//!
//! Newtype wrappers for the physical quantities an analysis configuration
//! carries. Each wrapper knows the quantity tag and unit label the session
//! expects, so a value can only be encoded with the unit it was created in.
//!
//! ## Encoding
//!
//! Quantities encode as `<tag>:<value>;<unit>`:
//!
//! ```text
//! CaesamQty_PRESSURE:100;MPa
//! CaesamQty_DIMENSIONLESS:1;none
//! ```
//!
//! ## Example
//!
//! ```rust
//! use esa_core::units::{Dimensionless, Megapascals, Quantity};
//!
//! assert_eq!(Megapascals(100.0).encode(), "CaesamQty_PRESSURE:100;MPa");
//! assert_eq!(Dimensionless(1.0).encode(), "CaesamQty_DIMENSIONLESS:1;none");
//! ```

use serde::{Deserialize, Serialize};

/// A physical quantity with a fixed session tag and unit label.
pub trait Quantity {
    /// Quantity type tag (e.g. `CaesamQty_PRESSURE`)
    const TAG: &'static str;
    /// Unit label written after the `;`
    const UNIT: &'static str;

    /// Raw magnitude in [`Self::UNIT`]
    fn magnitude(&self) -> f64;

    /// Encode as a typed value string
    fn encode(&self) -> String {
        format!("{}:{};{}", Self::TAG, self.magnitude(), Self::UNIT)
    }
}

// ============================================================================
// Stress Units
// ============================================================================

/// Stress in megapascals
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Megapascals(pub f64);

impl Quantity for Megapascals {
    const TAG: &'static str = "CaesamQty_PRESSURE";
    const UNIT: &'static str = "MPa";

    fn magnitude(&self) -> f64 {
        self.0
    }
}

// ============================================================================
// Dimensionless
// ============================================================================

/// Pure ratio / multiplier without unit
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimensionless(pub f64);

impl Quantity for Dimensionless {
    const TAG: &'static str = "CaesamQty_DIMENSIONLESS";
    const UNIT: &'static str = "none";

    fn magnitude(&self) -> f64 {
        self.0
    }
}
