use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::interpreter::{RiskCategory, RiskResult};
use super::schema::FormKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Danger,
    Warning,
    Safe,
    Neutral,
}

impl Tone {
    pub fn for_category(category: RiskCategory) -> Self {
        match category {
            RiskCategory::VeryHigh | RiskCategory::High | RiskCategory::Risky => Self::Danger,
            RiskCategory::Medium => Self::Warning,
            RiskCategory::Low | RiskCategory::NotRisky => Self::Safe,
            RiskCategory::Unknown => Self::Neutral,
        }
    }

    /// Tone of a 0-100 score.
    pub fn for_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::Danger
        } else if score >= 30.0 {
            Self::Warning
        } else {
            Self::Safe
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressIndicator {
    pub label: &'static str,
    /// Reported score, as received.
    pub score: f64,
    /// Bar fill, clamped to 0-100.
    pub fill: f64,
    pub tone: Tone,
}

impl ProgressIndicator {
    pub fn new(label: &'static str, score: f64) -> Self {
        Self {
            label,
            score,
            fill: score.clamp(0.0, 100.0),
            tone: Tone::for_score(score),
        }
    }
}

/// Render-ready view of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskView {
    pub form: FormKind,
    pub headline: String,
    pub badge: Tone,
    pub risky: bool,
    pub risk_percentage: Option<u8>,
    pub indicators: Vec<ProgressIndicator>,
    pub recommendation: Option<&'static str>,
    pub risk_factors: Vec<String>,
    pub message: Option<String>,
}

const HIGH_RECOMMENDATION: &str = "This chemical combination is potentially hazardous. Professional handling with proper safety equipment is strongly recommended.";
const MEDIUM_RECOMMENDATION: &str = "Exercise caution when handling this combination. Use appropriate safety equipment and follow proper procedures.";
const LOW_RECOMMENDATION: &str = "This combination appears relatively safe, but always follow standard laboratory safety protocols.";

pub fn render(form: FormKind, result: &RiskResult) -> RiskView {
    let mut view = RiskView {
        form,
        headline: result.label.clone(),
        badge: Tone::for_category(result.category),
        risky: result.is_risky(),
        risk_percentage: result.risk_percentage,
        indicators: Vec::new(),
        recommendation: None,
        risk_factors: Vec::new(),
        message: result.message.clone(),
    };

    match form {
        FormKind::Recipe => {
            view.indicators = [
                ("Explosiveness", "explosiveness"),
                ("Health Risk", "health_risk"),
                ("Overall Risk", "risk_score"),
            ]
            .into_iter()
            .filter_map(|(label, metric)| {
                result
                    .auxiliary(metric)
                    .map(|score| ProgressIndicator::new(label, score))
            })
            .collect();
            view.recommendation = Some(recipe_recommendation(&result.label));
        }
        FormKind::Importer | FormKind::Future => {
            view.risk_factors = risk_factors(&result.raw_input);
        }
        FormKind::EndUser => {}
    }

    view
}

pub fn recipe_recommendation(level: &str) -> &'static str {
    let level = level.to_lowercase();
    if level.contains("high") {
        HIGH_RECOMMENDATION
    } else if level.contains("medium") {
        MEDIUM_RECOMMENDATION
    } else {
        LOW_RECOMMENDATION
    }
}

/// Plain-language factors behind an importer or trend score.
pub fn risk_factors(raw_input: &Map<String, Value>) -> Vec<String> {
    let lookup = |keys: &[&str]| keys.iter().find_map(|key| raw_input.get(*key));
    let mut factors = Vec::new();

    if let Some(history) = lookup(&["complianceHistory", "Compliance_History"]).and_then(Value::as_str)
    {
        if matches!(history, "Poor" | "Average") {
            factors.push(format!("Compliance history rated {history}"));
        }
    }

    let violations = lookup(&["pastViolations", "Past_Violations"]).and_then(Value::as_f64);
    if let Some(count) = violations.filter(|count| *count > 0.0) {
        let noun = if count == 1.0 { "violation" } else { "violations" };
        factors.push(format!("{count} past {noun} on record"));
    }

    if lookup(&["financialStability", "Financial_Stability"]).and_then(Value::as_str)
        == Some("Low")
    {
        factors.push("Low financial stability".to_string());
    }

    factors
}

impl fmt::Display for RiskView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.form, self.headline)?;
        if let Some(percentage) = self.risk_percentage {
            write!(f, " ({percentage}%)")?;
        }
        writeln!(f)?;
        for indicator in &self.indicators {
            writeln!(f, "  {:<14} {:>5.1}%", indicator.label, indicator.score)?;
        }
        for factor in &self.risk_factors {
            writeln!(f, "  - {factor}")?;
        }
        if let Some(message) = &self.message {
            writeln!(f, "  {message}")?;
        }
        if let Some(recommendation) = self.recommendation {
            writeln!(f, "  Recommendation: {recommendation}")?;
        }
        Ok(())
    }
}
