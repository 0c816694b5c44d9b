mod bootstrap;

use anyhow::Result;
use clap::Parser;
use etv_core::settings::Settings;
use etv_runtime::orchestrator::do_computation;

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(&settings.log_level)?;
    tracing::info!("ETV v{} starting", env!("CARGO_PKG_VERSION"));

    let config = settings.pipeline_config()?;
    tracing::info!(
        "Input: {}, output: {}, timezone: {}, HDD base: {}C",
        config.input_dir.display(),
        config.output_dir.display(),
        config.timezone,
        config.hdd_baseline_c
    );

    bootstrap::ensure_output_dir(&config.output_dir)?;
    bootstrap::configure_thread_pool(settings.threads)?;

    let outcome = do_computation(&config)?;

    tracing::info!(
        "{} households, {} after filtering",
        outcome.basic.len(),
        outcome.basic_filtered.len()
    );
    match outcome.segmented {
        Some(segmented) => tracing::info!(
            "{} segmented households, {} with efficiency gain",
            segmented.summary.households,
            segmented.summary.households_with_gain
        ),
        None => tracing::info!("No grouping data; segmentation skipped"),
    }

    Ok(())
}
