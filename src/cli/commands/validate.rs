use std::path::Path;

use crate::pipeline::raw_store::load_raw;
use crate::pipeline::{all_stages, validate_raw};

/// Runs the raw gate and every table stage on a saved payload without
/// touching the store.
pub async fn cmd_validate(file: &Path) -> anyhow::Result<()> {
    let raw = load_raw(file).await?;

    let validation = validate_raw(&raw);
    if !validation.passed {
        anyhow::bail!(
            "{}: {}",
            validation.error.unwrap_or_default(),
            validation.error_detail.unwrap_or_default()
        );
    }
    println!(
        "✓ raw_anilist: {} bytes",
        validation.size_bytes.unwrap_or_default()
    );

    let mut failed = Vec::new();
    for output in all_stages(&raw) {
        let mark = if output.check.passed { "✓" } else { "✗" };
        println!(
            "{} {}: {} rows, {} dropped",
            mark,
            output.name,
            output.check.row_count,
            output.dropped
        );
        for error in &output.errors {
            println!("  {error}");
        }
        if output.check.row_count > 0 {
            println!("{}", output.check.preview.to_markdown());
        }
        if !output.check.passed {
            failed.push(output.name);
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Checks failed for: {}", failed.join(", "));
    }
    Ok(())
}
