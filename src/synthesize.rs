//! Synthesis of document summaries into one validated [`TrendReport`].
//!
//! The generator is asked for JSON. A response that fails to parse or
//! violates the report schema is retried with the violation appended to
//! the instruction, up to `synthesis.max_attempts`. Nothing partially
//! valid is ever returned.

use trend_assistant_core::models::{CreativeBrief, DocumentSummary};
use trend_assistant_core::report::{parse_report, SchemaError, TrendReport};

use crate::config::{OnEmpty, SynthesisConfig};
use crate::error::PipelineError;
use crate::llm::{GenerationRequest, ThrottledGenerator};

const SYSTEM_INSTRUCTION: &str = "You are the lead trend forecaster for a globally respected \
fashion trend analysis firm. You answer with a single JSON object and nothing else.";

const REPORT_SCHEMA: &str = r##"{
  "season": "Season name",
  "year": 2025,
  "theme": "A concise, evocative name for the collection's overarching theme.",
  "cultural_drivers": ["High-level socio-cultural influences driving the trend."],
  "influential_models": ["Models or style icons. If none are named, suggest 2-3 archetypal icons."],
  "accessories": {
    "bags": ["Bag styles."],
    "footwear": ["Shoe and boot styles."],
    "jewelry": ["Jewelry styles."],
    "other": ["Hats, belts, scarves and similar."]
  },
  "key_garments": [
    {
      "name": "Descriptive name of a key garment.",
      "description": "This item's role and significance.",
      "fabrics": [
        {
          "material": "Base material, e.g. 'Organic Cotton'.",
          "texture": "Surface texture, e.g. 'Satin Weave'.",
          "sustainable": true,
          "sustainability_comment": "Why it is sustainable, or a specific alternative if not."
        }
      ],
      "colors": [
        {"name": "Common color name.", "pantone_code": "Pantone TCX code.", "hex_value": "#RRGGBB"}
      ],
      "silhouette": "The cut and shape of the garment.",
      "details_trims": ["Design details, hardware, or trims."],
      "suggested_pairings": ["Items this piece could be styled with."],
      "inspired_by_designers": ["1-2 real designers known for this type of garment."]
    }
  ],
  "color_palette": ["The season's key color names."]
}"##;

/// A synthesized report and how many validation retries it took.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub report: TrendReport,
    pub validation_retries: u32,
}

pub struct Synthesizer {
    generator: ThrottledGenerator,
    max_attempts: u32,
    temperature: f32,
    on_empty: OnEmpty,
}

impl Synthesizer {
    pub fn new(generator: ThrottledGenerator, config: &SynthesisConfig) -> Self {
        Self {
            generator,
            max_attempts: config.max_attempts,
            temperature: config.temperature,
            on_empty: config.on_empty,
        }
    }

    pub async fn synthesize(
        &self,
        brief: &CreativeBrief,
        summaries: &[DocumentSummary],
    ) -> Result<SynthesisOutcome, PipelineError> {
        let usable: Vec<&DocumentSummary> = summaries
            .iter()
            .filter(|s| s.succeeded && !s.summary_text.trim().is_empty())
            .collect();

        let low_confidence = usable.is_empty();
        if low_confidence {
            match self.on_empty {
                OnEmpty::Fail => {
                    return Err(PipelineError::Exhausted(format!(
                        "none of {} documents produced a usable summary",
                        summaries.len()
                    )))
                }
                OnEmpty::LowConfidence => {
                    tracing::warn!("no usable summaries, synthesizing a low-confidence report")
                }
            }
        }

        let base_prompt = synthesis_prompt(brief, &usable);
        let mut last_failure: Option<(SchemaError, String)> = None;

        for attempt in 1..=self.max_attempts {
            let prompt = match &last_failure {
                None => base_prompt.clone(),
                Some((error, _)) => format!("{}\n\n{}", base_prompt, correction(error)),
            };
            let request = GenerationRequest::new(prompt)
                .with_system(SYSTEM_INSTRUCTION)
                .with_temperature(self.temperature)
                .json();

            let raw = self.generator.generate(&request).await.result?;

            match parse_report(&raw) {
                Ok(mut report) => {
                    fill_from_brief(&mut report, brief);
                    report.low_confidence = low_confidence;
                    tracing::info!(
                        attempt,
                        garments = report.key_garments.len(),
                        low_confidence,
                        "synthesized trend report"
                    );
                    return Ok(SynthesisOutcome {
                        report,
                        validation_retries: attempt - 1,
                    });
                }
                Err(error) => {
                    tracing::warn!(attempt, error = %error, "synthesized report failed validation");
                    last_failure = Some((error, raw));
                }
            }
        }

        match last_failure {
            Some((error, raw_response)) => Err(PipelineError::Validation {
                attempts: self.max_attempts,
                error,
                raw_response,
            }),
            None => Err(PipelineError::Config(
                "synthesis.max_attempts must be >= 1".to_string(),
            )),
        }
    }
}

fn fill_from_brief(report: &mut TrendReport, brief: &CreativeBrief) {
    if report.season.trim().is_empty() {
        report.season = brief.season().label().to_string();
    }
    if report.year.is_none() {
        report.year = Some(brief.year());
    }
}

fn correction(error: &SchemaError) -> String {
    format!(
        "Your previous response was rejected: {}. Return the complete JSON object again, \
         fixing this problem and following the schema exactly.",
        error
    )
}

pub fn synthesis_prompt(brief: &CreativeBrief, summaries: &[&DocumentSummary]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("CREATIVE BRIEF: {}\n\n", brief));

    if summaries.is_empty() {
        prompt.push_str(
            "No research summaries are available for this brief. Base the report on \
             established, widely reported industry knowledge for the season and theme, \
             and keep every claim conservative.\n\n",
        );
    } else {
        prompt.push_str(
            "Synthesize the research summaries below into a single, cohesive fashion trend \
             report. Base your analysis strictly on these summaries; do not invent facts.\n\n\
             RESEARCH SUMMARIES:\n",
        );
        for summary in summaries {
            prompt.push_str(&format!(
                "---\nSource: {}\n{}\n",
                summary.source_url,
                summary.summary_text.trim()
            ));
        }
        prompt.push_str("---\n\n");
    }

    prompt.push_str(&format!(
        "RULES:\n\
         1. Every list must contain unique items only.\n\
         2. Every color must carry a real Pantone TCX code and a #RRGGBB hex value.\n\
         3. Every key garment needs at least one fabric and one color.\n\n\
         Generate one JSON object for the {} {} season that follows this schema exactly:\n{}\n",
        brief.season().label(),
        brief.year(),
        REPORT_SCHEMA
    ));
    prompt
}
