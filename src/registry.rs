//! Extraction from the national corporate-number registry export
//!
//! The registry publishes headerless CSV with one corporation per row. Only
//! a handful of positions matter for lead lists; they are projected to
//! English column names and cleaned up on the way out.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use crate::model::{Columns, Row};
use crate::source::{RowSink, RowSource};

/// Registry positions (0-based) and the column names they are written under
pub const REGISTRY_FIELDS: [(usize, &str); 8] = [
    (1, "corporate_number"),
    (4, "last_update_date"),
    (5, "corporate_number_assigned_date"),
    (6, "company_name"),
    (9, "prefecture"),
    (10, "city_town"),
    (11, "address_details"),
    (15, "postal_code"),
];

const ASSIGNED_DATE: usize = 2;
const COMPANY_NAME: usize = 3;
const POSTAL_CODE: usize = 7;

/// Trim whitespace, then any surrounding double quotes
pub fn clean_value(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

/// Format a postal code as `NNN-NNNN`.
///
/// A float artefact such as `1120004.0` loses its `.0`, non-digits are
/// dropped and short codes are zero-padded to 7 digits. Empty stays empty.
pub fn normalize_postal_code(value: &str) -> String {
    let value = value.strip_suffix(".0").unwrap_or(value);
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return String::new();
    }
    let padded = format!("{:0>7}", digits);
    format!("{}-{}", &padded[..3], &padded[3..])
}

/// Parse a date written with any separators, e.g. `2015-10-05` or `20151005`
pub fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    NaiveDate::parse_from_str(&digits, "%Y%m%d").ok()
}

/// Counts from one extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub rows_read: usize,
    pub written: usize,
    /// Assigned date missing, unparsable, or not after the threshold
    pub rejected_date: usize,
    /// Company name without the required substring
    pub rejected_name: usize,
}

/// Projects, cleans and filters registry rows
#[derive(Debug, Clone)]
pub struct RegistryExtractor {
    assigned_after: NaiveDate,
    name_contains: String,
}

impl Default for RegistryExtractor {
    fn default() -> Self {
        Self {
            // the day before the corporate number system took effect
            assigned_after: NaiveDate::from_ymd_opt(2015, 10, 5).expect("valid calendar date"),
            name_contains: "株式会社".to_string(),
        }
    }
}

impl RegistryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep rows whose assigned date is strictly after `date`
    pub fn with_assigned_after(mut self, date: NaiveDate) -> Self {
        self.assigned_after = date;
        self
    }

    /// Keep rows whose company name contains `needle` (case-sensitive);
    /// an empty needle keeps every row
    pub fn with_name_contains(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = needle.into();
        self
    }

    /// Header of the extracted output
    pub fn output_columns() -> Columns {
        REGISTRY_FIELDS.iter().map(|&(_, name)| name).collect()
    }

    /// Project and clean one registry row
    pub fn project(row: &Row) -> Vec<String> {
        let mut values: Vec<String> = REGISTRY_FIELDS
            .iter()
            .map(|&(pos, _)| row.values().get(pos).map(|v| clean_value(v)).unwrap_or_default())
            .collect();
        values[POSTAL_CODE] = normalize_postal_code(&values[POSTAL_CODE]);
        values
    }

    /// Stream `source` and write every admitted, projected row to `sink`
    #[instrument(level = "info", skip_all, fields(source = %source.describe()))]
    pub fn extract<S: RowSource + ?Sized>(
        &self,
        source: &S,
        sink: &mut dyn RowSink,
    ) -> Result<ExtractSummary> {
        let columns = Self::output_columns();
        let mut summary = ExtractSummary::default();
        sink.begin(&columns)?;

        for row in source.rows()? {
            let row = row?;
            summary.rows_read += 1;
            let values = Self::project(&row);

            let assigned = parse_compact_date(&values[ASSIGNED_DATE]);
            if !assigned.is_some_and(|d| d > self.assigned_after) {
                summary.rejected_date += 1;
                continue;
            }
            if !values[COMPANY_NAME].contains(self.name_contains.as_str()) {
                summary.rejected_name += 1;
                continue;
            }

            sink.write_row(&Row::new(columns.clone(), values, row.line()))?;
            summary.written += 1;
        }
        sink.finish()?;

        info!(
            read = summary.rows_read,
            written = summary.written,
            "registry extraction complete"
        );
        Ok(summary)
    }
}
