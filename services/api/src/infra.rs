use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chemrisk::assessment::{Endpoint, ScoringClientError, ScoringService};
use chemrisk::session::{Credentials, IdentityError, IdentityProvider, Registration, UserProfile};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Offline stand-in for the scoring service. Replies mirror the shapes the real
/// backend produces, including its plain-text forecast reply.
#[derive(Debug, Default, Clone)]
pub(crate) struct CannedScoringService {
    latency: Duration,
}

impl CannedScoringService {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl ScoringService for CannedScoringService {
    async fn post(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ScoringClientError> {
        debug!(endpoint = endpoint.path(), "canned scoring reply");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let features = body
            .get("num_features")
            .and_then(Value::as_u64)
            .unwrap_or(5) as usize;

        let reply = match endpoint {
            Endpoint::ImporterRisk => importer_reply(body),
            Endpoint::ExplainLime => json!({
                "lime_explanations": {
                    "feature_importance": lime_features(features),
                    "model_confidence": 0.71
                }
            }),
            Endpoint::ExplainShap => json!({
                "shap_explanations": { "top_features": shap_features(features) }
            }),
            Endpoint::Predict => Value::String(
                "Predicted Category: Medium, Probability: 0.58".to_string(),
            ),
            Endpoint::PredictRisk => json!({ "predicted_risk": end_user_code(body) }),
            Endpoint::Analyze => recipe_reply(body),
        };
        Ok(reply)
    }
}

fn importer_reply(body: &Value) -> Value {
    let violations = body
        .get("pastViolations")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let poor_history = body.get("complianceHistory") == Some(&json!("Poor"));
    let probability = (0.35 + violations * 0.12 + if poor_history { 0.2 } else { 0.0 }).min(0.97);
    let category = if probability >= 0.5 { "Risky" } else { "Not Risky" };

    let mut reply = json!({
        "risk_category": category,
        "risk_probability": probability,
    });
    if body.get("xai_method") == Some(&json!("lime")) {
        reply["xai_method"] = json!("lime");
        reply["xai_explanations"] = json!({
            "feature_importance": lime_features(3),
            "model_confidence": 0.71
        });
    }
    reply
}

fn lime_features(count: usize) -> Vec<Value> {
    [
        ("pastViolations > 1.00", 0.284),
        ("complianceHistory=Poor", 0.197),
        ("financialStability=Low", 0.121),
        ("importVolume > 5000.00", 0.064),
        ("countryOfOrigin=India", -0.032),
    ]
    .into_iter()
    .take(count)
    .map(|(feature, importance)| json!({ "feature": feature, "importance": importance }))
    .collect()
}

fn shap_features(count: usize) -> Vec<Value> {
    [
        ("pastViolations", 0.412),
        ("importVolume", 0.236),
        ("complianceHistory", 0.158),
        ("hsCode", -0.047),
        ("importFrequency", -0.021),
    ]
    .into_iter()
    .take(count)
    .map(|(feature, shap_value)| json!({ "feature": feature, "shap_value": shap_value }))
    .collect()
}

fn end_user_code(body: &Value) -> i64 {
    match body.get("issued_qty").and_then(Value::as_f64) {
        Some(quantity) if quantity >= 1000.0 => 2,
        Some(quantity) if quantity >= 100.0 => 1,
        _ => 0,
    }
}

fn recipe_reply(body: &Value) -> Value {
    let rows = body
        .get("chemicals")
        .and_then(Value::as_array)
        .map_or(0, Vec::len) as f64;
    let explosiveness = (20.0 * rows).min(95.0);
    let health_risk = (15.0 * rows + 5.0).min(95.0);
    let risk_score = (explosiveness + health_risk) / 2.0;
    let level = if risk_score >= 70.0 {
        "High Risk"
    } else if risk_score >= 30.0 {
        "Medium Risk"
    } else {
        "Low Risk"
    };
    json!({
        "explosiveness": explosiveness,
        "health_risk": health_risk,
        "risk_score": risk_score,
        "overall_risk_level": level
    })
}

/// Accepts any well-formed credentials; for offline runs only.
#[derive(Debug, Default, Clone)]
pub(crate) struct DemoIdentityProvider;

#[async_trait]
impl IdentityProvider for DemoIdentityProvider {
    async fn verify(&self, credentials: &Credentials) -> Result<UserProfile, IdentityError> {
        if !credentials.email.contains('@') {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(UserProfile {
            email: credentials.email.trim().to_string(),
            name: None,
        })
    }

    async fn register(&self, registration: &Registration) -> Result<UserProfile, IdentityError> {
        if !registration.email.contains('@') {
            return Err(IdentityError::Rejected("email address is malformed".to_string()));
        }
        Ok(UserProfile {
            email: registration.email.trim().to_string(),
            name: Some(registration.name.trim().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemrisk::assessment::{interpret, Expectation, RiskCategory};

    #[tokio::test]
    async fn canned_replies_are_interpretable() {
        let scoring = CannedScoringService::default();

        let reply = scoring
            .post(Endpoint::Predict, &json!([{}]))
            .await
            .expect("canned reply");
        let result = interpret(&reply, Expectation::Trend).expect("trend label");
        assert_eq!(result.category, RiskCategory::Medium);

        let reply = scoring
            .post(Endpoint::PredictRisk, &json!({ "issued_qty": 250.0 }))
            .await
            .expect("canned reply");
        let result = interpret(&reply, Expectation::EndUser).expect("risk code");
        assert_eq!(result.category, RiskCategory::Medium);

        let reply = scoring
            .post(
                Endpoint::Analyze,
                &json!({ "chemicals": [{ "name": "a" }, { "name": "b" }] }),
            )
            .await
            .expect("canned reply");
        let result = interpret(&reply, Expectation::Recipe).expect("recipe scores");
        assert_eq!(result.label, "Medium Risk");
        assert_eq!(result.auxiliary("explosiveness"), Some(40.0));
    }

    #[tokio::test]
    async fn importer_reply_embeds_lime_only_when_asked() {
        let scoring = CannedScoringService::default();
        let body = json!({ "pastViolations": 3, "complianceHistory": "Poor", "xai_method": "shap" });
        let reply = scoring
            .post(Endpoint::ImporterRisk, &body)
            .await
            .expect("canned reply");
        assert_eq!(reply["risk_category"], json!("Risky"));
        assert!(reply.get("xai_explanations").is_none());
    }
}
