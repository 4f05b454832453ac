use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::client::{Endpoint, ScoringClientError, ScoringService};
use super::lifetime::AbortSignal;
use super::payload::SubmissionPayload;

/// Model-explanation technique offered for importer predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationMethod {
    #[default]
    Lime,
    Shap,
}

impl ExplanationMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lime => "lime",
            Self::Shap => "shap",
        }
    }

    pub const fn endpoint(self) -> Endpoint {
        match self {
            Self::Lime => Endpoint::ExplainLime,
            Self::Shap => Endpoint::ExplainShap,
        }
    }
}

impl fmt::Display for ExplanationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplanationMethod {
    type Err = ExplanationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lime" => Ok(Self::Lime),
            "shap" => Ok(Self::Shap),
            other => Err(ExplanationError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationData {
    pub method: ExplanationMethod,
    /// In the order the service ranked them.
    pub feature_importances: Vec<FeatureImportance>,
    pub model_confidence: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExplanationError {
    #[error("unknown explanation method '{0}'")]
    UnknownMethod(String),
    #[error("explanations need a completed prediction")]
    NoPrediction,
    #[error(transparent)]
    Scoring(#[from] ScoringClientError),
    #[error("explanation service reported an error: {0}")]
    ServiceReported(String),
    #[error("explanation response did not match any known format")]
    UnrecognizedFormat,
    #[error("explanation request cancelled")]
    Cancelled,
}

const WRAPPERS: [&str; 3] = ["xai_explanations", "lime_explanations", "shap_explanations"];

/// Read a feature-importance list out of any explanation reply shape.
pub fn parse_explanation(
    body: &Value,
    method: ExplanationMethod,
) -> Result<ExplanationData, ExplanationError> {
    if let Some(message) = error_message(body) {
        return Err(ExplanationError::ServiceReported(message));
    }

    let container = WRAPPERS
        .iter()
        .find_map(|key| body.get(key))
        .unwrap_or(body);
    if let Some(message) = error_message(container) {
        return Err(ExplanationError::ServiceReported(message));
    }

    let (entries, weight_key) = if let Some(entries) = container.get("feature_importance") {
        (entries, "importance")
    } else if let Some(entries) = container.get("top_features") {
        (entries, "shap_value")
    } else {
        return Err(ExplanationError::UnrecognizedFormat);
    };

    let feature_importances = entries
        .as_array()
        .ok_or(ExplanationError::UnrecognizedFormat)?
        .iter()
        .map(|entry| {
            let feature = entry.get("feature").and_then(Value::as_str)?;
            let importance = entry
                .get(weight_key)
                .or_else(|| entry.get("importance"))
                .and_then(Value::as_f64)?;
            Some(FeatureImportance {
                feature: feature.to_string(),
                importance,
            })
        })
        .collect::<Option<Vec<_>>>()
        .ok_or(ExplanationError::UnrecognizedFormat)?;

    Ok(ExplanationData {
        method,
        feature_importances,
        model_confidence: container.get("model_confidence").and_then(Value::as_f64),
    })
}

/// Explanation embedded in an importer prediction reply, if it carried a usable one.
pub fn embedded(body: &Value, requested: ExplanationMethod) -> Option<ExplanationData> {
    body.get("xai_explanations")?;
    let method = body
        .get("xai_method")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(requested);

    match parse_explanation(body, method) {
        Ok(data) => Some(data),
        Err(err) => {
            debug!(error = %err, "prediction reply carried no usable explanation");
            None
        }
    }
}

fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Importer explanation state: whichever method was requested last owns the list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExplanationPanel {
    method: ExplanationMethod,
    data: Option<ExplanationData>,
    error: Option<String>,
}

impl ExplanationPanel {
    pub fn new(method: ExplanationMethod) -> Self {
        Self {
            method,
            data: None,
            error: None,
        }
    }

    pub fn method(&self) -> ExplanationMethod {
        self.method
    }

    pub fn data(&self) -> Option<&ExplanationData> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Show an explanation that arrived with the prediction itself.
    pub fn seed(&mut self, data: ExplanationData) {
        self.method = data.method;
        self.data = Some(data);
        self.error = None;
    }

    pub fn clear(&mut self) {
        self.data = None;
        self.error = None;
    }

    /// Switch to `method` and fetch its explanation. Always issues a request, even
    /// when `method` is already selected.
    pub async fn select_method<S>(
        &mut self,
        service: &S,
        payload: &SubmissionPayload,
        method: ExplanationMethod,
        num_features: u8,
        signal: &AbortSignal,
    ) -> Result<&ExplanationData, ExplanationError>
    where
        S: ScoringService + ?Sized,
    {
        self.method = method;
        let body = payload
            .clone()
            .with_entry("num_features", Value::from(num_features))
            .with_entry("xai_method", Value::from(method.as_str()))
            .into_body();

        let reply = tokio::select! {
            biased;
            _ = signal.aborted() => return Err(ExplanationError::Cancelled),
            reply = service.post(method.endpoint(), &body) => reply,
        };

        match reply
            .map_err(ExplanationError::from)
            .and_then(|reply| parse_explanation(&reply, method))
        {
            Ok(data) => {
                self.error = None;
                Ok(&*self.data.insert(data))
            }
            Err(err) => {
                warn!(method = %method, error = %err, "explanation fetch failed");
                self.data = None;
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_shap_top_features_in_rank_order() {
        let body = json!({
            "shap_explanations": {
                "top_features": [
                    { "feature": "pastViolations", "shap_value": 0.41 },
                    { "feature": "complianceHistory", "shap_value": -0.12 }
                ],
                "plot": "iVBORw0KGgo="
            }
        });
        let data = parse_explanation(&body, ExplanationMethod::Shap).expect("parses");
        assert_eq!(data.feature_importances.len(), 2);
        assert_eq!(data.feature_importances[0].feature, "pastViolations");
        assert_eq!(data.feature_importances[1].importance, -0.12);
        assert_eq!(data.model_confidence, None);
    }

    #[test]
    fn wrapped_errors_are_reported() {
        let body = json!({ "xai_explanations": { "error": "Could not initialize LIME explainer" } });
        match parse_explanation(&body, ExplanationMethod::Lime) {
            Err(ExplanationError::ServiceReported(message)) => {
                assert!(message.contains("LIME"));
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn embedded_uses_reported_method() {
        let body = json!({
            "risk_category": "Risky",
            "risk_probability": 0.7,
            "xai_method": "shap",
            "xai_explanations": {
                "top_features": [{ "feature": "importVolume", "shap_value": 0.3 }]
            }
        });
        let data = embedded(&body, ExplanationMethod::Lime).expect("embedded explanation");
        assert_eq!(data.method, ExplanationMethod::Shap);
        assert!(embedded(&json!({ "risk_category": "Risky" }), ExplanationMethod::Lime).is_none());
    }

    #[test]
    fn parses_method_names_case_insensitively() {
        assert_eq!("SHAP".parse::<ExplanationMethod>().ok(), Some(ExplanationMethod::Shap));
        assert!(matches!(
            "anchors".parse::<ExplanationMethod>(),
            Err(ExplanationError::UnknownMethod(name)) if name == "anchors"
        ));
    }
}
