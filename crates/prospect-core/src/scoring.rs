//! Quality assessment helpers shared by every scorer.
//!
//! Remote scorers are untrusted: their JSON goes through
//! [`parse_assessment`], which validates the shape against
//! [`assessment_schema`] and clamps every field into range.

use std::sync::LazyLock;

use serde_json::{Value, json};

use crate::classify::is_generic_email;
use crate::error::AppError;
use crate::models::{QualityAssessment, WealthSignal};
use crate::traits::QualityScorer;

static ASSESSMENT_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": {
            "lead_score": {
                "type": "number",
                "description": "Lead quality from 0 (worthless) to 100 (ideal prospect)"
            },
            "wealth_signal": {
                "type": "string",
                "description": "Apparent financial capacity: High, Medium or Low"
            },
            "estimated_revenue": {
                "type": "string",
                "description": "Annual revenue bucket, e.g. \"$50k-$100k\", or \"Unknown\""
            }
        },
        "required": ["lead_score", "wealth_signal", "estimated_revenue"],
        "additionalProperties": false
    })
});

/// JSON schema every scorer response must satisfy.
pub fn assessment_schema() -> &'static Value {
    &ASSESSMENT_SCHEMA
}

/// Validate a scorer response and normalize it.
///
/// Scores are rounded and clamped to 0..=100, the wealth signal is parsed
/// case-insensitively and a blank revenue becomes `"Unknown"`.
pub fn parse_assessment(value: &Value) -> Result<QualityAssessment, AppError> {
    let validator = jsonschema::validator_for(assessment_schema())
        .map_err(|e| AppError::ParseError(format!("Invalid assessment schema: {e}")))?;
    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(AppError::ParseError(format!(
            "Assessment does not match schema: {}",
            errors.join("; ")
        )));
    }

    let score = value["lead_score"]
        .as_f64()
        .ok_or_else(|| AppError::ParseError("lead_score is not a number".into()))?;
    let lead_score = if score.is_finite() {
        score.round().clamp(0.0, 100.0) as u8
    } else {
        0
    };

    let wealth_signal = value["wealth_signal"]
        .as_str()
        .unwrap_or_default()
        .parse::<WealthSignal>()
        .unwrap_or(WealthSignal::Unknown);

    Ok(QualityAssessment {
        lead_score,
        wealth_signal,
        estimated_revenue: value["estimated_revenue"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    }
    .clamped())
}

const HIGH_WEALTH_CUES: &[&str] = &[
    "luxury",
    "premium",
    "boutique",
    "exclusive",
    "bespoke",
    "high-end",
    "concierge",
];
const LOW_WEALTH_CUES: &[&str] = &["affordable", "discount", "cheap", "budget", "low cost"];

/// Deterministic offline scorer.
///
/// Used when no remote scorer is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    const BASE_SCORE: i32 = 40;

    pub fn score(&self, name: &str, excerpt: &str, email: Option<&str>) -> QualityAssessment {
        let text = format!("{name} {excerpt}").to_lowercase();
        let mut score = Self::BASE_SCORE;

        if let Some(email) = email {
            score += 15;
            if !is_generic_email(email) {
                score += 10;
            }
        }

        let wealth_signal = if HIGH_WEALTH_CUES.iter().any(|cue| text.contains(cue)) {
            score += 10;
            WealthSignal::High
        } else if LOW_WEALTH_CUES.iter().any(|cue| text.contains(cue)) {
            score -= 10;
            WealthSignal::Low
        } else {
            WealthSignal::Medium
        };

        let estimated_revenue = match wealth_signal {
            WealthSignal::High => "$1M+",
            WealthSignal::Medium => "$250k-$1M",
            WealthSignal::Low => "<$250k",
            WealthSignal::Unknown => "Unknown",
        };

        QualityAssessment {
            lead_score: score.clamp(0, 100) as u8,
            wealth_signal,
            estimated_revenue: estimated_revenue.to_string(),
        }
    }
}

impl QualityScorer for HeuristicScorer {
    async fn assess(
        &self,
        name: &str,
        excerpt: &str,
        email: Option<&str>,
    ) -> Result<QualityAssessment, AppError> {
        Ok(self.score(name, excerpt, email))
    }
}
