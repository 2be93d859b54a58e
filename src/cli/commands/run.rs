use crate::config::Config;
use crate::pipeline::{Pipeline, RunReport, RunStatus};

pub async fn cmd_run(config: Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config).await?;
    let report = pipeline.run_once().await?;

    print_report(&report);

    if report.status == RunStatus::Failed {
        anyhow::bail!(
            "Pipeline run {} failed: {}",
            report.run_id,
            report.message().unwrap_or_default()
        );
    }
    Ok(())
}

pub fn print_report(report: &RunReport) {
    println!("Run {} ({})", report.run_id, report.status.as_str());
    println!("{:-<70}", "");

    match (&report.raw.error, report.raw.size_bytes) {
        (Some(error), _) => {
            println!("✗ raw_anilist: {error}");
            if let Some(detail) = &report.raw.error_detail {
                println!("  {detail}");
            }
        }
        (None, Some(bytes)) => println!("✓ raw_anilist: {bytes} bytes"),
        (None, None) => println!("✓ raw_anilist"),
    }

    for stage in &report.stages {
        let mark = if stage.passed { "✓" } else { "✗" };
        print!("{} {}: {} rows", mark, stage.stage, stage.row_count);
        if stage.dropped > 0 {
            print!(", {} dropped", stage.dropped);
        }
        if let Some(error) = &stage.error {
            print!(" ({error})");
        }
        println!();
    }

    if let Some((users, entries)) = report.published {
        println!("Published {users} user and {entries} entry messages");
    }

    for (table, rows) in &report.aggregations {
        println!("• {table}: {rows} rows");
    }
}
