pub use super::pipeline_runs::Entity as PipelineRuns;
pub use super::stage_checks::Entity as StageChecks;
