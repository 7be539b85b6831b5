//! # Result Extraction
//!
//! The equivalent stress comes out of one of two files:
//!
//! - **Full analysis**: the HTML report. Besides the equivalent stress it
//!   carries the rainflow summary (validity in flights, min/max stress,
//!   R ratio, cycle count).
//! - **Fast analysis**: the `;`-separated CSV summary, equivalent stress
//!   only.
//!
//! Both are scanned line by line for fixed markers. The report's layout is
//! owned by the tool, so only the markers below are relied on.
//!
//! | Output | Section marker | Value line |
//! |--------|----------------|------------|
//! | HTML, fatigue | `FATIGUE RESULTS:` | `EQUIVALENT STRESS` |
//! | HTML, propagation | `MISSION PROPAGATION RESULTS` | `EQUIVALENT STRESS` |
//! | CSV, fatigue | `FATIGUE INITIATION RESULTS` (line start) | `Equivalent stress` |
//! | CSV, propagation | `PROPAGATION RESULTS` (line start) | `Equivalent stress` |

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{EsaError, EsaResult};
use crate::profile::Profile;

const FLIGHTS_MARKER: &str = "Total Number of Flights:";
const RAINFLOW_VALUES_MARKER: &str = "Values";
const HTML_STRESS_MARKER: &str = "EQUIVALENT STRESS";
const CSV_STRESS_MARKER: &str = "Equivalent stress";

/// Rainflow counting summary from the HTML report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainflowSummary {
    /// Number of flights in the spectrum
    pub validity: u32,
    pub minimum_stress: f64,
    pub maximum_stress: f64,
    pub r_ratio: f64,
    pub total_cycles: u64,
}

/// Result of a full (HTML) extraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FullEsaResult {
    pub equivalent_stress: f64,
    /// Absent when the report has no rainflow block
    pub rainflow: Option<RainflowSummary>,
}

/// Result of a fast (CSV) extraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FastEsaResult {
    pub equivalent_stress: f64,
}

/// What a finished job reports back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EsaOutcome {
    Full(FullEsaResult),
    Fast(FastEsaResult),
}

impl EsaOutcome {
    pub fn equivalent_stress(&self) -> f64 {
        match self {
            EsaOutcome::Full(result) => result.equivalent_stress,
            EsaOutcome::Fast(result) => result.equivalent_stress,
        }
    }
}

fn html_section_marker(profile: Profile) -> &'static str {
    match profile {
        Profile::Fatigue => "FATIGUE RESULTS:",
        Profile::Propagation => "MISSION PROPAGATION RESULTS",
    }
}

fn csv_section_marker(profile: Profile) -> &'static str {
    match profile {
        Profile::Fatigue => "FATIGUE INITIATION RESULTS",
        Profile::Propagation => "PROPAGATION RESULTS",
    }
}

fn quantity(profile: Profile) -> String {
    format!("{profile} equivalent stress")
}

/// Parse a number out of a report cell
fn number<T: FromStr>(field: &str, raw: Option<&str>, source: &str) -> EsaResult<T> {
    let raw = raw.map(str::trim).unwrap_or_default();
    raw.parse().map_err(|_| {
        EsaError::invalid_input(field, raw, format!("Not a number in '{source}'"))
    })
}

/// Extract the equivalent stress and rainflow summary from an HTML report.
///
/// `source` names the report in errors.
pub fn extract_full(html: &str, profile: Profile, source: &str) -> EsaResult<FullEsaResult> {
    let section = html_section_marker(profile);
    let mut rainflow: Option<RainflowSummary> = None;
    let mut lines = html.lines();

    while let Some(line) = lines.next() {
        if line.contains(FLIGHTS_MARKER) {
            let validity_cell = line
                .split(':')
                .nth(1)
                .and_then(|rest| rest.trim().split("<BR>").next());
            let validity: u32 = number("validity", validity_cell, source)?;

            if let Some(values) = lines.by_ref().find(|l| l.contains(RAINFLOW_VALUES_MARKER)) {
                rainflow = Some(parse_rainflow_values(values, validity, source)?);
            }
        } else if line.contains(section) {
            if let Some(stress_line) = lines.by_ref().find(|l| l.contains(HTML_STRESS_MARKER)) {
                let cell = stress_line
                    .split("</TH><TD ALIGN=CENTER>")
                    .nth(1)
                    .and_then(|rest| rest.trim().split("</TD></TR>").next());
                let equivalent_stress = number(HTML_STRESS_MARKER, cell, source)?;
                return Ok(FullEsaResult {
                    equivalent_stress,
                    rainflow,
                });
            }
        }
    }

    Err(EsaError::result_not_found(quantity(profile), source))
}

/// `<TR><TH>Values</TH><TD>min</TD><TD>max</TD><TD>..</TD><TD>..</TD><TD>R</TD><TD>cycles</TD></TR>`
fn parse_rainflow_values(line: &str, validity: u32, source: &str) -> EsaResult<RainflowSummary> {
    let cells: Vec<&str> = line.split("</TD><TD>").map(str::trim).collect();
    let minimum = cells
        .first()
        .and_then(|cell| cell.split("</TH><TD>").nth(1));
    let cycles = cells
        .get(5)
        .and_then(|cell| cell.split("</TD></TR>").next());

    Ok(RainflowSummary {
        validity,
        minimum_stress: number("minimum stress", minimum, source)?,
        maximum_stress: number("maximum stress", cells.get(1).copied(), source)?,
        r_ratio: number("R ratio", cells.get(4).copied(), source)?,
        total_cycles: number("total cycles", cycles, source)?,
    })
}

/// Extract the equivalent stress from a CSV summary.
pub fn extract_fast(csv: &str, profile: Profile, source: &str) -> EsaResult<FastEsaResult> {
    let section = csv_section_marker(profile);
    let mut lines = csv.lines();

    while let Some(line) = lines.next() {
        if !line.starts_with(section) {
            continue;
        }
        if let Some(stress_line) = lines.by_ref().find(|l| l.contains(CSV_STRESS_MARKER)) {
            let value = stress_line.trim().split(';').nth(1);
            let equivalent_stress = number(CSV_STRESS_MARKER, value, source)?;
            return Ok(FastEsaResult { equivalent_stress });
        }
    }

    Err(EsaError::result_not_found(quantity(profile), source))
}

fn read(path: &Path) -> EsaResult<String> {
    fs::read_to_string(path)
        .map_err(|e| EsaError::file_error("read", path.display().to_string(), e.to_string()))
}

/// Read and extract an HTML report
pub fn read_full(path: &Path, profile: Profile) -> EsaResult<FullEsaResult> {
    extract_full(&read(path)?, profile, &path.display().to_string())
}

/// Read and extract a CSV summary
pub fn read_fast(path: &Path, profile: Profile) -> EsaResult<FastEsaResult> {
    extract_fast(&read(path)?, profile, &path.display().to_string())
}
