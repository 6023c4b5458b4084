//! The `trend run` and `trend prompts` commands.
//!
//! Both print a short summary to stdout and write their artifacts to
//! `output.results_dir`. A terminal synthesis failure also persists the
//! last raw response so it can be inspected.

use anyhow::{bail, Result};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use trend_assistant_core::models::{CreativeBrief, Season};
use trend_assistant_core::prompts::PromptSet;

use crate::brief;
use crate::config::Config;
use crate::error::PipelineError;
use crate::output;
use crate::pipeline::{build_generator, Pipeline, RunOutcome, RunSource};

/// Brief fields as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct BriefArgs {
    pub season: Option<String>,
    pub year: Option<i32>,
    pub theme: Option<String>,
    pub audience: Option<String>,
    pub region: Option<String>,
    pub passage: Option<String>,
}

impl BriefArgs {
    /// Build a brief from explicit flags. `None` when a passage must be
    /// deconstructed instead.
    pub fn explicit_brief(&self) -> Result<Option<CreativeBrief>> {
        if self.passage.is_some() {
            if self.season.is_some() || self.year.is_some() || self.theme.is_some() {
                bail!("--passage cannot be combined with --season, --year or --theme");
            }
            return Ok(None);
        }
        let (Some(season), Some(year), Some(theme)) = (&self.season, self.year, &self.theme) else {
            bail!("--season, --year and --theme are required unless --passage is given");
        };
        let season: Season = season.parse()?;
        let brief = CreativeBrief::new(season, year, theme.as_str())?
            .with_audience(self.audience.clone())
            .with_region(self.region.clone());
        Ok(Some(brief))
    }
}

pub async fn run_trends(
    config: &Config,
    args: &BriefArgs,
    use_cache: bool,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let explicit = args.explicit_brief()?;
    let generator = build_generator(config)?;

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, timeout_secs.or(config.pipeline.run_timeout_secs));

    let brief = match explicit {
        Some(brief) => brief,
        None => {
            let passage = args.passage.as_deref().unwrap_or_default();
            brief::deconstruct(&generator, passage, &cancel).await?
        }
    };

    let pipeline = Pipeline::from_config(config, generator, use_cache).await?;

    match pipeline.run(&brief, &cancel).await {
        Ok(outcome) => {
            let written = output::write_run(&config.output, &outcome.report, &outcome.prompts)?;
            print_outcome(&brief, &outcome);
            println!("  Report:      {}", written.report.display());
            println!("  Prompts:     {}", written.prompts.display());
            Ok(())
        }
        Err(PipelineError::Validation {
            attempts,
            error,
            raw_response,
        }) => {
            let path = output::write_invalid_response(&config.output, &raw_response)?;
            bail!(
                "synthesis produced no valid report after {} attempts: {} (last response saved to {})",
                attempts,
                error,
                path.display()
            );
        }
        Err(e) => Err(e.into()),
    }
}

/// Ctrl-C and the optional wall-clock limit both cancel the run.
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout_secs: Option<u64>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!(timeout_secs = secs, "run timed out, cancelling");
            token.cancel();
        });
    }
}

fn print_outcome(brief: &CreativeBrief, outcome: &RunOutcome) {
    println!("Trend report for {}", brief);
    println!();
    println!("  Theme:       {}", outcome.report.theme);
    println!("  Garments:    {}", outcome.report.key_garments.len());
    println!("  Prompts:     {}", outcome.prompts.len());
    match &outcome.source {
        RunSource::Cached { similarity } => {
            println!("  Source:      cache (similarity {:.3})", similarity);
        }
        RunSource::Fresh {
            documents,
            summaries_succeeded,
            summaries_failed,
            validation_retries,
            stored,
        } => {
            println!("  Source:      fresh research");
            println!("  Documents:   {}", documents);
            println!(
                "  Summaries:   {} ok, {} failed",
                summaries_succeeded, summaries_failed
            );
            println!("  Retries:     {}", validation_retries);
            println!("  Cached:      {}", if *stored { "yes" } else { "no" });
        }
    }
    if outcome.report.low_confidence {
        println!("  Warning:     low-confidence report, no research was usable");
    }
}

/// Regenerate the prompt file from a saved report. Makes no network calls.
pub fn run_prompts(config: &Config, report_path: &Path) -> Result<()> {
    let report = output::read_report(report_path)?;
    let prompts = PromptSet::from_report(&report);
    let path = output::write_prompts(&config.output, &prompts)?;
    println!(
        "Generated {} prompt(s) for '{}' -> {}",
        prompts.len(),
        report.theme,
        path.display()
    );
    Ok(())
}
