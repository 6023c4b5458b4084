//! The structured trend report and its schema validation.
//!
//! Every field of [`TrendReport`] deserializes with a default so that a
//! generator omitting a field produces a precise [`SchemaError::Violation`]
//! from [`TrendReport::validate`] rather than an opaque parse error.
//! [`parse_report`] is the single entry point used on raw generator output:
//! unwrap code fences → deserialize → normalize → validate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A schema violation or parse failure for a generated report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("report is not valid JSON for the schema: {0}")]
    Json(String),
    #[error("schema violation at {path}: {rule}")]
    Violation { path: String, rule: String },
}

impl SchemaError {
    fn violation(path: impl Into<String>, rule: impl Into<String>) -> Self {
        SchemaError::Violation {
            path: path.into(),
            rule: rule.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendReport {
    #[serde(default)]
    pub season: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, alias = "overarching_theme")]
    pub theme: String,
    #[serde(default)]
    pub cultural_drivers: Vec<String>,
    #[serde(default)]
    pub influential_models: Vec<String>,
    #[serde(default)]
    pub accessories: Accessories,
    #[serde(default, alias = "detailed_key_pieces")]
    pub key_garments: Vec<KeyGarment>,
    #[serde(default)]
    pub color_palette: Vec<String>,
    /// Set when the report was produced without any research input.
    #[serde(default)]
    pub low_confidence: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Accessories {
    #[serde(default, alias = "Bags")]
    pub bags: Vec<String>,
    #[serde(default, alias = "Footwear")]
    pub footwear: Vec<String>,
    #[serde(default, alias = "Jewelry")]
    pub jewelry: Vec<String>,
    #[serde(default, alias = "Other")]
    pub other: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyGarment {
    #[serde(default, alias = "key_piece_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fabrics: Vec<Fabric>,
    #[serde(default)]
    pub colors: Vec<Color>,
    #[serde(default)]
    pub silhouette: String,
    #[serde(default)]
    pub details_trims: Vec<String>,
    #[serde(default)]
    pub suggested_pairings: Vec<String>,
    #[serde(default)]
    pub inspired_by_designers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fabric {
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub sustainable: bool,
    #[serde(default)]
    pub sustainability_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pantone_code: Option<String>,
    #[serde(default)]
    pub hex_value: Option<String>,
}

impl TrendReport {
    /// Check the report against the fixed schema.
    ///
    /// Returns the first violated rule. A report that fails here is never
    /// cached, persisted, or handed back to a caller.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.theme.trim().is_empty() {
            return Err(SchemaError::violation("theme", "must not be empty"));
        }
        if self.cultural_drivers.is_empty() {
            return Err(SchemaError::violation(
                "cultural_drivers",
                "must contain at least one entry",
            ));
        }
        for (i, driver) in self.cultural_drivers.iter().enumerate() {
            if driver.trim().is_empty() {
                return Err(SchemaError::violation(
                    format!("cultural_drivers[{}]", i),
                    "must not be empty",
                ));
            }
        }
        if self.key_garments.is_empty() {
            return Err(SchemaError::violation(
                "key_garments",
                "must contain at least one garment",
            ));
        }
        for (i, garment) in self.key_garments.iter().enumerate() {
            garment.validate(&format!("key_garments[{}]", i))?;
        }
        for (i, entry) in self.color_palette.iter().enumerate() {
            if entry.trim().is_empty() {
                return Err(SchemaError::violation(
                    format!("color_palette[{}]", i),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// De-duplicate list fields (order preserving) and derive the palette
    /// from garment colors when the generator left it out.
    pub fn normalize(&mut self) {
        dedup_in_place(&mut self.cultural_drivers);
        dedup_in_place(&mut self.influential_models);
        dedup_in_place(&mut self.accessories.bags);
        dedup_in_place(&mut self.accessories.footwear);
        dedup_in_place(&mut self.accessories.jewelry);
        dedup_in_place(&mut self.accessories.other);
        for garment in &mut self.key_garments {
            dedup_in_place(&mut garment.details_trims);
            dedup_in_place(&mut garment.suggested_pairings);
            dedup_in_place(&mut garment.inspired_by_designers);
        }
        if self.color_palette.is_empty() {
            self.color_palette = self
                .key_garments
                .iter()
                .flat_map(|g| g.colors.iter())
                .map(|c| c.name.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        dedup_in_place(&mut self.color_palette);
    }
}

impl KeyGarment {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::violation(format!("{}.name", path), "must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(SchemaError::violation(
                format!("{}.description", path),
                "must not be empty",
            ));
        }
        if self.silhouette.trim().is_empty() {
            return Err(SchemaError::violation(
                format!("{}.silhouette", path),
                "must not be empty",
            ));
        }
        if self.fabrics.is_empty() {
            return Err(SchemaError::violation(
                format!("{}.fabrics", path),
                "must contain at least one fabric",
            ));
        }
        for (i, fabric) in self.fabrics.iter().enumerate() {
            if fabric.material.trim().is_empty() {
                return Err(SchemaError::violation(
                    format!("{}.fabrics[{}].material", path, i),
                    "must not be empty",
                ));
            }
        }
        if self.colors.is_empty() {
            return Err(SchemaError::violation(
                format!("{}.colors", path),
                "must contain at least one color",
            ));
        }
        for (i, color) in self.colors.iter().enumerate() {
            if color.name.trim().is_empty() {
                return Err(SchemaError::violation(
                    format!("{}.colors[{}].name", path, i),
                    "must not be empty",
                ));
            }
            if let Some(hex) = &color.hex_value {
                if !is_hex_color(hex) {
                    return Err(SchemaError::violation(
                        format!("{}.colors[{}].hex_value", path, i),
                        format!("'{}' is not a #RRGGBB color", hex),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn is_hex_color(s: &str) -> bool {
    let s = s.trim();
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.trim().to_lowercase()));
}

/// Strip a surrounding Markdown code fence (```json … ```), if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse raw generator output into a validated, normalized [`TrendReport`].
///
/// ```rust
/// use trend_assistant_core::report::{parse_report, SchemaError};
///
/// let err = parse_report(r#"{"theme": "Soft Power"}"#).unwrap_err();
/// assert!(matches!(err, SchemaError::Violation { ref path, .. } if path == "cultural_drivers"));
/// ```
pub fn parse_report(raw: &str) -> Result<TrendReport, SchemaError> {
    let body = strip_code_fence(raw);
    let mut report: TrendReport =
        serde_json::from_str(body).map_err(|e| SchemaError::Json(e.to_string()))?;
    report.normalize();
    report.validate()?;
    Ok(report)
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_report;
    use super::*;

    #[test]
    fn sample_report_is_valid() {
        assert_eq!(sample_report().validate(), Ok(()));
    }

    #[test]
    fn missing_garment_fields_are_reported_with_path() {
        let mut report = sample_report();
        report.key_garments[0].fabrics.clear();
        assert_eq!(
            report.validate(),
            Err(SchemaError::Violation {
                path: "key_garments[0].fabrics".to_string(),
                rule: "must contain at least one fabric".to_string(),
            })
        );
    }

    #[test]
    fn bad_hex_is_rejected() {
        let mut report = sample_report();
        report.key_garments[0].colors[0].hex_value = Some("charcoal".to_string());
        assert!(matches!(
            report.validate(),
            Err(SchemaError::Violation { ref path, .. }) if path == "key_garments[0].colors[0].hex_value"
        ));
    }

    #[test]
    fn parse_accepts_fenced_output_and_original_field_names() {
        let raw = r##"```json
{
  "season": "Fall",
  "year": 2025,
  "overarching_theme": "Utility Grace",
  "cultural_drivers": ["Quiet luxury", "quiet luxury", "Workwear revival"],
  "influential_models": [],
  "accessories": {"Bags": ["Structured tote"], "Footwear": [], "Jewelry": [], "Other": []},
  "detailed_key_pieces": [{
    "key_piece_name": "Chore coat",
    "description": "Workwear staple refined.",
    "fabrics": [{"material": "Cotton canvas", "sustainable": true}],
    "colors": [{"name": "Olive", "hex_value": "#556B2F"}, {"name": "Ecru"}],
    "silhouette": "Boxy"
  }]
}
```"##;
        let report = parse_report(raw).unwrap();
        assert_eq!(report.theme, "Utility Grace");
        assert_eq!(report.cultural_drivers.len(), 2);
        assert_eq!(report.accessories.bags, vec!["Structured tote"]);
        assert_eq!(report.key_garments[0].name, "Chore coat");
        assert_eq!(report.color_palette, vec!["Olive", "Ecru"]);
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(matches!(
            parse_report("Here is your report!"),
            Err(SchemaError::Json(_))
        ));
    }

    #[test]
    fn strip_code_fence_leaves_plain_text_alone() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    }
}
