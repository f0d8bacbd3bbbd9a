mod bootstrap;

use anyhow::{Context, Result};
use insight_core::settings::{ExclusionConfig, Settings};
use insight_data::analysis::{run_analysis, AnalysisInputs};
use insight_report::{export_results, render_summary};

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("Masterclass Insights v{} starting", env!("CARGO_PKG_VERSION"));

    let exclusions = settings
        .resolve_exclusions(&ExclusionConfig::config_path())
        .context("resolving exclusion list")?;
    let config = settings
        .pipeline_config(exclusions.to_policy())
        .context("invalid analysis settings")?;

    tracing::info!(
        session_minutes = config.session_minutes,
        interval = config.interval_minutes,
        min_score = config.min_score,
        excluded_domains = exclusions.domains.len(),
        "configuration resolved"
    );

    let inputs = AnalysisInputs::from_paths(
        &settings.participants,
        settings.chat.as_deref(),
        settings.crm.as_deref(),
    );
    let result = run_analysis(&inputs, &config)
        .with_context(|| format!("analysing {}", settings.participants.display()))?;

    bootstrap::ensure_output_dir(&settings.output)?;
    let manifest = export_results(&result, &settings.output)
        .with_context(|| format!("writing reports to {}", settings.output.display()))?;

    tracing::info!(
        files = manifest.files.len(),
        output = %manifest.output_dir.display(),
        "reports written"
    );

    if !settings.quiet {
        print!("{}", render_summary(&result));
        println!();
        println!(
            "Wrote {} files to {}",
            manifest.files.len(),
            manifest.output_dir.display()
        );
    }

    Ok(())
}
