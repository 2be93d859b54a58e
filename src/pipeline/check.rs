//! Acceptance gates run on the raw payload and on every produced table.
//!
//! Gates never fail with an error; they report pass/fail and metadata that the
//! runner persists and uses to decide whether downstream stages run.

use serde::Serialize;
use tracing::{error, info};

use super::table::Table;
use crate::models::RawPayload;

pub const RAW_VALIDATION_FAILED: &str = "raw_anilist validation failed";
pub const NO_ROWS_PROCESSED: &str = "no rows processed";

/// Columns left out of table previews.
pub const PREVIEW_EXCLUDED: &[&str] = &[
    "stats",
    "rankings",
    "statistics",
    "genres",
    "tags",
    "synonyms",
];

const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
}

/// Checks that `raw` has the RawPayload envelope. Entries and media are not
/// inspected here.
pub fn validate_raw(raw: &serde_json::Value) -> ValidationResult {
    match RawPayload::from_value(raw) {
        Ok(_) => {
            let size_bytes = serde_json::to_vec(raw).map(|b| b.len()).ok();
            ValidationResult {
                passed: true,
                error: None,
                error_detail: None,
                size_bytes,
            }
        }
        Err(e) => {
            error!("{}: {}", RAW_VALIDATION_FAILED, e);
            ValidationResult {
                passed: false,
                error: Some(RAW_VALIDATION_FAILED.to_string()),
                error_detail: Some(e.to_string()),
                size_bytes: None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub passed: bool,
    pub row_count: usize,
    pub preview: Table,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn validate_table(name: &str, table: &Table) -> CheckResult {
    let row_count = table.row_count();
    let preview = table.tail_without(PREVIEW_ROWS, PREVIEW_EXCLUDED);

    if row_count == 0 {
        error!(table = name, "{}", NO_ROWS_PROCESSED);
        return CheckResult {
            passed: false,
            row_count,
            preview,
            error: Some(NO_ROWS_PROCESSED.to_string()),
        };
    }

    info!(table = name, rows = row_count, "Table check passed");
    CheckResult {
        passed: true,
        row_count,
        preview,
        error: None,
    }
}
