mod consume;
mod history;
mod run;
mod validate;

pub use consume::cmd_consume;
pub use history::cmd_history;
pub use run::{cmd_run, print_report};
pub use validate::cmd_validate;
