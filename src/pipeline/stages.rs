//! Stage wrappers: flatten -> table -> normalize -> acceptance gate.
//!
//! Stages are pure functions of the raw payload. They never fail; problems
//! show up in the returned [`StageOutput`].

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::check::{CheckResult, validate_table};
use super::flatten::{FlattenError, Flattened, flatten, flatten_user};
use super::table::{Table, normalize};
use crate::models::{DimensionMedia, DimensionUser, FactAnime, FromEntry};

/// How many record errors are copied into stage metadata.
const MAX_REPORTED_ERRORS: usize = 20;

#[derive(Debug, Clone)]
pub struct StageOutput {
    pub name: &'static str,
    pub table: Table,
    pub check: CheckResult,
    pub errors: Vec<FlattenError>,
    /// Records skipped by the flattener.
    pub dropped: usize,
}

#[derive(Debug, Serialize)]
struct StageMetadata {
    count: usize,
    dropped: usize,
    preview: String,
    errors: Vec<String>,
}

impl StageOutput {
    /// Count, preview and the first record errors, for the run log.
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        let metadata = StageMetadata {
            count: self.check.row_count,
            dropped: self.dropped,
            preview: self.check.preview.to_markdown(),
            errors: self
                .errors
                .iter()
                .take(MAX_REPORTED_ERRORS)
                .map(ToString::to_string)
                .collect(),
        };
        serde_json::to_value(metadata).unwrap_or_else(|_| json!({}))
    }
}

fn finish<T: Serialize>(name: &'static str, flattened: Flattened<T>) -> StageOutput {
    let dropped = flattened.dropped();
    let Flattened {
        records,
        mut errors,
    } = flattened;

    let table = match Table::from_records(&records) {
        Ok(table) => normalize(table),
        Err(e) => {
            warn!(stage = name, "Failed to tabulate records: {}", e);
            errors.push(FlattenError::Structural(e.to_string()));
            Table::default()
        }
    };

    let check = validate_table(name, &table);
    let output = StageOutput {
        name,
        table,
        check,
        errors,
        dropped,
    };

    metrics::counter!("pipeline_records_total", "table" => name)
        .increment(output.check.row_count as u64);
    metrics::counter!("pipeline_records_dropped_total", "table" => name)
        .increment(output.dropped as u64);

    info!(
        stage = name,
        rows = output.check.row_count,
        dropped = output.dropped,
        passed = output.check.passed,
        "Stage finished"
    );
    output
}

fn entry_stage<T: FromEntry>(raw: &serde_json::Value) -> StageOutput {
    finish(T::TABLE, flatten::<T>(raw))
}

pub fn fact_anime(raw: &serde_json::Value) -> StageOutput {
    entry_stage::<FactAnime>(raw)
}

pub fn dimension_media(raw: &serde_json::Value) -> StageOutput {
    entry_stage::<DimensionMedia>(raw)
}

pub fn dimension_user(raw: &serde_json::Value) -> StageOutput {
    finish(DimensionUser::TABLE, flatten_user(raw))
}

/// Every table stage, in the order the runner writes them.
pub fn all_stages(raw: &serde_json::Value) -> Vec<StageOutput> {
    vec![fact_anime(raw), dimension_media(raw), dimension_user(raw)]
}
