//! Turning a natural-language request into a [`CreativeBrief`].

use serde::Deserialize;
use trend_assistant_core::models::{CreativeBrief, Season};
use trend_assistant_core::report::strip_code_fence;

use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::llm::{GenerationRequest, ThrottledGenerator};
use crate::pipeline::until_cancelled;

#[derive(Debug, Deserialize)]
struct BriefReply {
    #[serde(default)]
    season: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    theme_hint: Option<String>,
    #[serde(default)]
    target_audience: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

pub fn deconstruction_prompt(passage: &str) -> String {
    format!(
        "You are a fashion creative director's assistant. Read the request below and \
         extract a structured creative brief.\n\n\
         Return one JSON object with exactly these keys:\n\
         {{\"season\": \"spring|summer|fall|winter\", \"year\": 2025, \
         \"theme_hint\": \"short theme\", \"target_audience\": \"audience or null\", \
         \"region\": \"region or null\"}}\n\
         Use null for anything the request does not state, except season, year and \
         theme_hint, which you must infer.\n\n\
         REQUEST:\n---\n{}\n---\n",
        passage.trim()
    )
}

/// Ask the generator to structure `passage`, then validate it as a brief.
///
/// Returns [`PipelineError::Cancelled`] as soon as `cancel` fires.
pub async fn deconstruct(
    generator: &ThrottledGenerator,
    passage: &str,
    cancel: &CancellationToken,
) -> Result<CreativeBrief, PipelineError> {
    if passage.trim().is_empty() {
        return Err(PipelineError::Config("brief passage is empty".to_string()));
    }
    let request = GenerationRequest::new(deconstruction_prompt(passage))
        .with_temperature(0.0)
        .json();
    let raw = until_cancelled(cancel, generator.generate(&request)).await?.result?;
    let brief = parse_brief_reply(&raw)?;
    tracing::info!(brief = %brief, "deconstructed brief");
    Ok(brief)
}

fn parse_brief_reply(raw: &str) -> Result<CreativeBrief, PipelineError> {
    let reply: BriefReply = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| PipelineError::Config(format!("brief reply is not valid JSON: {}", e)))?;

    let season: Season = reply
        .season
        .as_deref()
        .unwrap_or_default()
        .parse()?;
    let year = reply
        .year
        .ok_or_else(|| PipelineError::Config("brief reply has no year".to_string()))?;
    let brief = CreativeBrief::new(season, year, reply.theme_hint.unwrap_or_default())?
        .with_audience(reply.target_audience)
        .with_region(reply.region);
    Ok(brief)
}
