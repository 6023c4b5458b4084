//! Core data models shared by the research, cache, and synthesis pipeline.
//!
//! A [`CreativeBrief`] is the only user input. It is immutable once built
//! and serves double duty as the search-query source and, via
//! [`CreativeBrief::canonical_text`], as the text that gets embedded for
//! the semantic cache.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::report::TrendReport;

/// Fashion season of a brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    #[serde(alias = "autumn")]
    Fall,
    Winter,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        }
    }

    /// Display label used in search queries and prompts (`"Fall"`).
    pub fn label(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Season {
    type Err = BriefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" | "autumn" => Ok(Season::Fall),
            "winter" => Ok(Season::Winter),
            other => Err(BriefError::UnknownSeason(other.to_string())),
        }
    }
}

/// Reasons a brief cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BriefError {
    #[error("unknown season '{0}' (expected spring, summer, fall/autumn, or winter)")]
    UnknownSeason(String),
    #[error("theme hint must not be empty")]
    EmptyTheme,
    #[error("year {0} is out of range (1900..=2100)")]
    YearOutOfRange(i32),
}

#[derive(Deserialize)]
struct BriefFields {
    season: Season,
    year: i32,
    theme_hint: String,
    #[serde(default)]
    target_audience: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

/// The user's creative request.
///
/// Fields are private so a brief can only exist in validated form; use
/// [`CreativeBrief::new`] plus the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BriefFields")]
pub struct CreativeBrief {
    season: Season,
    year: i32,
    theme_hint: String,
    target_audience: Option<String>,
    region: Option<String>,
}

impl TryFrom<BriefFields> for CreativeBrief {
    type Error = BriefError;

    fn try_from(f: BriefFields) -> Result<Self, Self::Error> {
        let mut brief = CreativeBrief::new(f.season, f.year, f.theme_hint)?;
        brief.target_audience = normalize_optional(f.target_audience);
        brief.region = normalize_optional(f.region);
        Ok(brief)
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreativeBrief {
    pub fn new(season: Season, year: i32, theme_hint: impl Into<String>) -> Result<Self, BriefError> {
        let theme_hint = theme_hint.into().trim().to_string();
        if theme_hint.is_empty() {
            return Err(BriefError::EmptyTheme);
        }
        if !(1900..=2100).contains(&year) {
            return Err(BriefError::YearOutOfRange(year));
        }
        Ok(Self {
            season,
            year,
            theme_hint,
            target_audience: None,
            region: None,
        })
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.target_audience = normalize_optional(audience);
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = normalize_optional(region);
        self
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn theme_hint(&self) -> &str {
        &self.theme_hint
    }

    pub fn target_audience(&self) -> Option<&str> {
        self.target_audience.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Canonical text form used as embedding input.
    ///
    /// Lower-cased, whitespace-collapsed, fixed field order, absent
    /// optional fields omitted. Two briefs with equal fields always
    /// produce byte-identical text.
    ///
    /// ```rust
    /// use trend_assistant_core::models::{CreativeBrief, Season};
    ///
    /// let brief = CreativeBrief::new(Season::Fall, 2025, "  Minimalist   Tailoring ").unwrap();
    /// assert_eq!(
    ///     brief.canonical_text(),
    ///     "season: fall; year: 2025; theme: minimalist tailoring"
    /// );
    /// ```
    pub fn canonical_text(&self) -> String {
        let mut parts = vec![
            format!("season: {}", self.season.as_str()),
            format!("year: {}", self.year),
            format!("theme: {}", collapse(&self.theme_hint)),
        ];
        if let Some(audience) = &self.target_audience {
            parts.push(format!("audience: {}", collapse(audience)));
        }
        if let Some(region) = &self.region {
            parts.push(format!("region: {}", collapse(region)));
        }
        parts.join("; ")
    }

    /// SHA-256 of [`canonical_text`](Self::canonical_text), hex encoded.
    pub fn canonical_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_text().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for CreativeBrief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: '{}'", self.season, self.year, self.theme_hint)?;
        if let Some(audience) = &self.target_audience {
            write!(f, " for {}", audience)?;
        }
        if let Some(region) = &self.region {
            write!(f, " in {}", region)?;
        }
        Ok(())
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A scraped page, held in memory only until it has been summarized.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub url: String,
    pub raw_text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Outcome of summarizing one [`SourceDocument`].
///
/// Failed summaries carry no text but are still returned so batch
/// accounting stays one-to-one with the input documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub source_url: String,
    pub summary_text: String,
    pub succeeded: bool,
    pub error_reason: Option<String>,
    pub attempts: u32,
}

impl DocumentSummary {
    pub fn success(source_url: impl Into<String>, text: impl Into<String>, attempts: u32) -> Self {
        Self {
            source_url: source_url.into(),
            summary_text: text.into(),
            succeeded: true,
            error_reason: None,
            attempts,
        }
    }

    pub fn failure(source_url: impl Into<String>, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            source_url: source_url.into(),
            summary_text: String::new(),
            succeeded: false,
            error_reason: Some(reason.into()),
            attempts,
        }
    }
}

/// A persisted semantic-cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub model: String,
    pub brief: CreativeBrief,
    pub brief_hash: String,
    pub report: TrendReport,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(embedding: Vec<f32>, model: &str, brief: CreativeBrief, report: TrendReport) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            embedding,
            model: model.to_string(),
            brief_hash: brief.canonical_hash(),
            brief,
            report,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_parses_autumn_alias() {
        assert_eq!("Autumn".parse::<Season>().unwrap(), Season::Fall);
        assert_eq!(" WINTER ".parse::<Season>().unwrap(), Season::Winter);
        assert!(matches!(
            "monsoon".parse::<Season>(),
            Err(BriefError::UnknownSeason(_))
        ));
    }

    #[test]
    fn brief_rejects_blank_theme_and_bad_year() {
        assert_eq!(
            CreativeBrief::new(Season::Fall, 2025, "   "),
            Err(BriefError::EmptyTheme)
        );
        assert_eq!(
            CreativeBrief::new(Season::Fall, 12, "tailoring"),
            Err(BriefError::YearOutOfRange(12))
        );
    }

    #[test]
    fn canonical_text_includes_optional_fields_in_fixed_order() {
        let brief = CreativeBrief::new(Season::Summer, 2026, "Coastal Linen")
            .unwrap()
            .with_region(Some("  Southern   Europe ".to_string()))
            .with_audience(Some("Gen Z".to_string()));
        assert_eq!(
            brief.canonical_text(),
            "season: summer; year: 2026; theme: coastal linen; audience: gen z; region: southern europe"
        );
    }

    #[test]
    fn empty_optionals_are_dropped() {
        let brief = CreativeBrief::new(Season::Spring, 2025, "florals")
            .unwrap()
            .with_audience(Some("  ".to_string()))
            .with_region(None);
        assert_eq!(brief.target_audience(), None);
        assert!(!brief.canonical_text().contains("audience"));
    }

    #[test]
    fn canonical_hash_is_stable_across_formatting() {
        let a = CreativeBrief::new(Season::Fall, 2025, "Quiet Luxury").unwrap();
        let b = CreativeBrief::new(Season::Fall, 2025, "quiet   luxury").unwrap();
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn deserialize_validates_brief() {
        let ok: CreativeBrief = serde_json::from_str(
            r#"{"season":"autumn","year":2025,"theme_hint":"suiting","region":""}"#,
        )
        .unwrap();
        assert_eq!(ok.season(), Season::Fall);
        assert_eq!(ok.region(), None);

        let bad = serde_json::from_str::<CreativeBrief>(
            r#"{"season":"fall","year":2025,"theme_hint":""}"#,
        );
        assert!(bad.is_err());
    }
}
