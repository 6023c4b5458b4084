//! Result artifacts written to `output.results_dir`.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use trend_assistant_core::prompts::PromptSet;
use trend_assistant_core::report::TrendReport;

use crate::config::OutputConfig;

/// Paths of the files one successful run produced.
#[derive(Debug, Clone)]
pub struct WrittenArtifacts {
    pub report: PathBuf,
    pub prompts: PathBuf,
}

pub fn write_report(config: &OutputConfig, report: &TrendReport) -> Result<PathBuf> {
    let path = config.results_dir.join(&config.report_file);
    write_json(&path, report)?;
    Ok(path)
}

pub fn write_prompts(config: &OutputConfig, prompts: &PromptSet) -> Result<PathBuf> {
    let path = config.results_dir.join(&config.prompts_file);
    write_json(&path, prompts)?;
    Ok(path)
}

pub fn write_run(config: &OutputConfig, report: &TrendReport, prompts: &PromptSet) -> Result<WrittenArtifacts> {
    Ok(WrittenArtifacts {
        report: write_report(config, report)?,
        prompts: write_prompts(config, prompts)?,
    })
}

/// Persist the last raw synthesis response for inspection.
///
/// Stored as parsed JSON when it parses, otherwise as a JSON string.
pub fn write_invalid_response(config: &OutputConfig, raw: &str) -> Result<PathBuf> {
    let path = config.results_dir.join(&config.invalid_response_file);
    let value = serde_json::from_str::<serde_json::Value>(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    write_json(&path, &value)?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create results directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load a report previously written by [`write_report`], re-validating it.
pub fn read_report(path: &Path) -> Result<TrendReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report file: {}", path.display()))?;
    trend_assistant_core::report::parse_report(&content)
        .with_context(|| format!("Report file is not a valid trend report: {}", path.display()))
}
