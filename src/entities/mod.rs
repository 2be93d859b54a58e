pub mod prelude;

pub mod pipeline_runs;
pub mod stage_checks;
