use crate::config::Config;
use crate::db::Store;

pub async fn cmd_history(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = Store::from_config(&config.storage).await?;
    let runs = store.recent_runs(limit).await?;

    if runs.is_empty() {
        println!("No pipeline runs yet.");
        return Ok(());
    }

    println!("Recent Runs (last {}):", runs.len());
    println!("{:-<70}", "");

    for run in runs {
        println!("• {} - {} [{}]", run.started_at, run.user_name, run.status);
        if let Some(message) = &run.message {
            println!("  {message}");
        }

        for check in store.stage_checks(&run.id).await? {
            let mark = if check.passed { "✓" } else { "✗" };
            println!("  {} {}: {} rows", mark, check.stage, check.row_count);
        }
    }

    Ok(())
}
