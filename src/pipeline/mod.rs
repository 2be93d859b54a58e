pub mod aggregate;
pub mod check;
pub mod flatten;
pub mod raw_store;
pub mod runner;
pub mod stages;
pub mod table;

pub use check::{CheckResult, ValidationResult, validate_raw, validate_table};
pub use flatten::{FlattenError, Flattened, flatten, flatten_user};
pub use runner::{Pipeline, RunReport, RunStatus, StageSummary};
pub use stages::{StageOutput, all_stages};
pub use table::{Table, normalize};
