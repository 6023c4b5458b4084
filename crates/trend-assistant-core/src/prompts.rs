//! Image-prompt generation from a validated [`TrendReport`].
//!
//! Deterministic: the same report always yields the same [`PromptSet`].
//! One [`GarmentPrompt`] is produced per key garment, in report order.

use serde::Serialize;

use crate::report::{KeyGarment, TrendReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GarmentPrompt {
    pub target_garment_name: String,
    /// Full-body editorial shot of the finished garment.
    pub prompt_text: String,
    pub inspiration_board: String,
    pub mood_board: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct PromptSet {
    pub prompts: Vec<GarmentPrompt>,
}

impl PromptSet {
    pub fn from_report(report: &TrendReport) -> Self {
        let model_style = report
            .influential_models
            .first()
            .map(String::as_str)
            .unwrap_or("a fashion model");
        let prompts = report
            .key_garments
            .iter()
            .map(|garment| GarmentPrompt {
                target_garment_name: garment.name.clone(),
                prompt_text: final_garment_prompt(garment, model_style),
                inspiration_board: inspiration_board_prompt(report, garment, model_style),
                mood_board: mood_board_prompt(garment),
            })
            .collect();
        Self { prompts }
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

fn inspiration_board_prompt(report: &TrendReport, garment: &KeyGarment, model_style: &str) -> String {
    format!(
        "A highly detailed, atmospheric inspiration board for a fashion collection. \
         Theme: '{theme}'. Focus: the conceptual idea of a '{piece}'. \
         Core feelings are driven by: {drivers}. \
         The aesthetic is influenced by figures like {model_style}. \
         The board contains evocative, abstract images, textures, and scribbled notes related to the theme. \
         Style: cinematic, moody lighting, ultra-realistic photo, high detail, 8k.",
        theme = report.theme,
        piece = garment.name,
        drivers = report.cultural_drivers.join(", "),
    )
}

fn mood_board_prompt(garment: &KeyGarment) -> String {
    let fabrics: Vec<&str> = garment.fabrics.iter().map(|f| f.material.as_str()).collect();
    let colors: Vec<&str> = garment.colors.iter().map(|c| c.name.as_str()).collect();
    format!(
        "A professional fashion designer's mood board, clean and meticulously organized. \
         Focus: defining the materials for a '{piece}'. \
         The board features hyper-realistic, physical fabric swatches of: {fabrics}. \
         A color palette is neatly arranged with Pantone-style swatches of: {colors}. \
         Also includes close-up shots of key trims and hardware: {trims}. \
         Style: shot on a clean, minimalist surface, top-down flat lay, perfect studio lighting, macro details, 8k.",
        piece = garment.name,
        fabrics = fabrics.join(", "),
        colors = colors.join(", "),
        trims = or_fallback(&garment.details_trims.join(", "), "subtle tonal finishes"),
    )
}

fn final_garment_prompt(garment: &KeyGarment, model_style: &str) -> String {
    let main_fabric = garment
        .fabrics
        .first()
        .map(|f| f.material.as_str())
        .unwrap_or("a high-quality fabric");
    let main_color = garment
        .colors
        .first()
        .map(|c| c.name.as_str())
        .unwrap_or("a core color");
    let silhouette = or_fallback(&garment.silhouette, "a modern silhouette");
    format!(
        "Full-body editorial fashion photograph for a lookbook. \
         A runway model, with the presence of {model_style}, is wearing a stunning \
         '{main_color} {piece}' crafted from high-quality {main_fabric}. \
         The design's silhouette is clearly {silhouette}. \
         Key details visible on the garment are: {trims}. \
         Shot in a minimalist concrete studio, dynamic pose, cinematic lighting, hyper-detailed, 8k.",
        piece = garment.name,
        trims = or_fallback(&garment.details_trims.join(", "), "clean construction"),
    )
}

fn or_fallback<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
