use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

const CATEGORY_MARKER: &str = "Category:";
const PROBABILITY_MARKER: &str = "Probability:";

/// Canonical risk bucket shared by every form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Risky,
    NotRisky,
    Low,
    Medium,
    High,
    VeryHigh,
    Unknown,
}

impl RiskCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Risky => "Risky",
            Self::NotRisky => "Not Risky",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Unknown => "Unknown",
        }
    }

    /// Map a free-form label such as `"Medium Risk"` or `"Not Risky"` onto a bucket.
    ///
    /// Negation is detected per word, so compound labels like `"Moderately Not Risky"`
    /// land in [`RiskCategory::NotRisky`] even though [`is_risky`] reports them risky.
    pub fn from_label(label: &str) -> Self {
        let lowered = label.trim().to_ascii_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let has = |needle: &str| words.iter().any(|word| *word == needle);

        if lowered.contains("very high") {
            Self::VeryHigh
        } else if has("not") && words.iter().any(|word| word.starts_with("risk")) {
            Self::NotRisky
        } else if has("risky") {
            Self::Risky
        } else if has("high") {
            Self::High
        } else if has("medium") || has("moderate") {
            Self::Medium
        } else if has("low") {
            Self::Low
        } else {
            Self::Unknown
        }
    }
}

/// Risky unless the label starts with "not"; otherwise it must mention "risky".
pub fn is_risky(label: &str) -> bool {
    let lowered = label.trim().to_lowercase();
    !lowered.starts_with("not") && lowered.contains("risky")
}

/// Response shape a form declares for its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Category plus probability (importer).
    Categorized,
    /// Predicted label only (future trend).
    Trend,
    /// Integer code or label under `predicted_risk` (end user).
    EndUser,
    /// Explosiveness / health / overall scores (recipe).
    Recipe,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskResult {
    pub category: RiskCategory,
    /// Label as reported by the service.
    pub label: String,
    /// 0-1 probability for categorized replies, 0-100 score for recipe replies.
    pub probability_or_score: f64,
    pub risk_percentage: Option<u8>,
    pub auxiliary_scores: BTreeMap<String, f64>,
    pub raw_input: Map<String, Value>,
    pub message: Option<String>,
}

impl RiskResult {
    fn labelled(label: impl Into<String>, probability_or_score: f64) -> Self {
        let label = label.into();
        Self {
            category: RiskCategory::from_label(&label),
            label,
            probability_or_score,
            risk_percentage: None,
            auxiliary_scores: BTreeMap::new(),
            raw_input: Map::new(),
            message: None,
        }
    }

    pub fn with_raw_input(mut self, raw_input: Map<String, Value>) -> Self {
        self.raw_input = raw_input;
        self
    }

    pub fn is_risky(&self) -> bool {
        is_risky(&self.label)
    }

    pub fn auxiliary(&self, metric: &str) -> Option<f64> {
        self.auxiliary_scores.get(metric).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpretError {
    #[error("response did not match any known format")]
    UnrecognizedFormat,
    #[error("scoring service reported an error: {0}")]
    ServiceReported(String),
}

/// Known reply schemas of the scoring service.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringReply {
    Categorized {
        label: String,
        probability: f64,
    },
    RecipeScores {
        explosiveness: f64,
        health_risk: f64,
        risk_score: f64,
        level: String,
    },
    LegacyRecipe {
        level: String,
        message: Option<String>,
    },
    PredictedLabel(String),
    PredictedCode(i64),
    ServiceError(String),
    Unrecognized,
}

impl ScoringReply {
    pub fn classify(body: &Value, expectation: Expectation) -> Self {
        if let Some(message) = service_error(body) {
            return Self::ServiceError(message);
        }

        match expectation {
            Expectation::Categorized => classify_categorized(body),
            Expectation::Recipe => classify_recipe(body),
            Expectation::Trend => classify_trend(body),
            Expectation::EndUser => classify_end_user(body),
        }
    }

    pub fn interpret(self) -> Result<RiskResult, InterpretError> {
        match self {
            Self::Categorized { label, probability } => {
                let mut result = RiskResult::labelled(label, probability);
                result.risk_percentage = percentage(probability);
                Ok(result)
            }
            Self::RecipeScores {
                explosiveness,
                health_risk,
                risk_score,
                level,
            } => {
                let mut result = RiskResult::labelled(level, risk_score);
                result.risk_percentage = score_percentage(risk_score);
                result.auxiliary_scores = BTreeMap::from([
                    ("explosiveness".to_string(), explosiveness),
                    ("health_risk".to_string(), health_risk),
                    ("risk_score".to_string(), risk_score),
                ]);
                Ok(result)
            }
            Self::LegacyRecipe { level, message } => {
                let mut result = RiskResult::labelled(level, 0.0);
                result.message = message;
                Ok(result)
            }
            Self::PredictedLabel(label) => Ok(RiskResult::labelled(label, 0.0)),
            Self::PredictedCode(code) => {
                let category = match code {
                    0 => RiskCategory::Low,
                    1 => RiskCategory::Medium,
                    2 => RiskCategory::High,
                    _ => RiskCategory::Unknown,
                };
                let mut result = RiskResult::labelled(category.label(), code as f64);
                result.category = category;
                Ok(result)
            }
            Self::ServiceError(message) => Err(InterpretError::ServiceReported(message)),
            Self::Unrecognized => Err(InterpretError::UnrecognizedFormat),
        }
    }
}

/// Classify `body` against `expectation` and convert it to a canonical result.
pub fn interpret(body: &Value, expectation: Expectation) -> Result<RiskResult, InterpretError> {
    ScoringReply::classify(body, expectation).interpret()
}

/// Whole percentage for a 0-1 fraction or an already scaled 0-100 score.
/// Recipe scores are already on a 0 to 100 scale.
pub(crate) fn score_percentage(score: f64) -> Option<u8> {
    score
        .is_finite()
        .then(|| score.round().clamp(0.0, 100.0) as u8)
}

pub(crate) fn percentage(value: f64) -> Option<u8> {
    if !value.is_finite() || value < 0.0 {
        None
    } else if value <= 1.0 {
        Some((value * 100.0).round() as u8)
    } else if value <= 100.0 {
        Some(value.round() as u8)
    } else {
        None
    }
}

fn service_error(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    match object.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn classify_categorized(body: &Value) -> ScoringReply {
    if let Value::String(text) = body {
        if let Some(reply) = marked_text(text) {
            return reply;
        }
    }

    if let Some(object) = body.as_object() {
        for (category_key, probability_key) in [
            ("Category", "Probability"),
            ("risk_category", "risk_probability"),
        ] {
            if let Some(label) = object.get(category_key).and_then(text_of) {
                let probability = object.get(probability_key).and_then(number_of).unwrap_or(0.0);
                return ScoringReply::Categorized { label, probability };
            }
        }
    }

    loose_scan(body)
}

/// `"Category: Risky, Probability: 0.82"`.
fn marked_text(text: &str) -> Option<ScoringReply> {
    let category_start = text.find(CATEGORY_MARKER)? + CATEGORY_MARKER.len();
    let probability_at = text.find(PROBABILITY_MARKER)?;

    let category_end = if probability_at > category_start {
        probability_at
    } else {
        text.len()
    };
    let label = text[category_start..category_end]
        .trim()
        .trim_end_matches([',', ';'])
        .trim();
    if label.is_empty() {
        return None;
    }

    let probability_text = text[probability_at + PROBABILITY_MARKER.len()..]
        .trim_start()
        .split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == 'e' || c == 'E'))
        .next()?;
    let probability = probability_text.parse::<f64>().ok()?;

    Some(ScoringReply::Categorized {
        label: label.to_string(),
        probability,
    })
}

fn loose_scan(body: &Value) -> ScoringReply {
    let text = match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    let label = keyword_regex()
        .find(&text)
        .map(|found| title_case(found.as_str()));
    let probability = decimal_regex()
        .find(&text)
        .and_then(|found| found.as_str().parse::<f64>().ok());

    match (label, probability) {
        (Some(label), Some(probability)) => ScoringReply::Categorized { label, probability },
        _ => ScoringReply::Unrecognized,
    }
}

fn classify_recipe(body: &Value) -> ScoringReply {
    let Some(object) = body.as_object() else {
        return ScoringReply::Unrecognized;
    };

    let scores = (
        object.get("explosiveness").and_then(number_of),
        object.get("health_risk").and_then(number_of),
        object.get("risk_score").and_then(number_of),
        object.get("overall_risk_level").and_then(text_of),
    );
    if let (Some(explosiveness), Some(health_risk), Some(risk_score), Some(level)) = scores {
        return ScoringReply::RecipeScores {
            explosiveness,
            health_risk,
            risk_score,
            level,
        };
    }

    match object.get("risk_level").and_then(text_of) {
        Some(level) => ScoringReply::LegacyRecipe {
            level,
            message: object.get("message").and_then(text_of),
        },
        None => ScoringReply::Unrecognized,
    }
}

fn classify_trend(body: &Value) -> ScoringReply {
    match body {
        Value::Object(object) => match object.get("predicted_risk") {
            Some(Value::String(label)) if !label.trim().is_empty() => {
                ScoringReply::PredictedLabel(label.trim().to_string())
            }
            Some(Value::Array(rows)) => match rows.first().and_then(text_of) {
                Some(label) => ScoringReply::PredictedLabel(label),
                None => ScoringReply::Unrecognized,
            },
            _ => ScoringReply::Unrecognized,
        },
        Value::String(text) => {
            if let Some(ScoringReply::Categorized { label, .. }) = marked_text(text) {
                return ScoringReply::PredictedLabel(label);
            }
            match keyword_regex().find(text) {
                Some(found) => ScoringReply::PredictedLabel(title_case(found.as_str())),
                None => ScoringReply::Unrecognized,
            }
        }
        _ => ScoringReply::Unrecognized,
    }
}

fn classify_end_user(body: &Value) -> ScoringReply {
    let Some(predicted) = body.as_object().and_then(|object| object.get("predicted_risk")) else {
        return ScoringReply::Unrecognized;
    };

    match predicted {
        Value::Number(number) => match number.as_i64() {
            Some(code) => ScoringReply::PredictedCode(code),
            None => ScoringReply::Unrecognized,
        },
        Value::String(text) => match text.trim().parse::<i64>() {
            Ok(code) => ScoringReply::PredictedCode(code),
            Err(_) if !text.trim().is_empty() => ScoringReply::PredictedLabel(text.trim().to_string()),
            Err(_) => ScoringReply::Unrecognized,
        },
        _ => ScoringReply::Unrecognized,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

fn keyword_regex() -> &'static Regex {
    static KEYWORD: OnceLock<Regex> = OnceLock::new();
    KEYWORD.get_or_init(|| {
        Regex::new(r"(?i)\b(very high|not risky|risky|high|medium|low)\b")
            .unwrap_or_else(|err| panic!("keyword pattern is valid: {err}"))
    })
}

fn decimal_regex() -> &'static Regex {
    static DECIMAL: OnceLock<Regex> = OnceLock::new();
    DECIMAL.get_or_init(|| {
        Regex::new(r"\d*\.\d+").unwrap_or_else(|err| panic!("decimal pattern is valid: {err}"))
    })
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
