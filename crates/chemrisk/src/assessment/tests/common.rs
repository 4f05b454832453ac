use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Map, Value};

use crate::assessment::client::{Endpoint, ScoringClientError, ScoringService};
use crate::assessment::forms::importer::ImporterAssessment;
use crate::assessment::service::AssessmentService;
use crate::assessment::{dashboard_router, DashboardState};
use crate::session::{
    Credentials, IdentityError, IdentityProvider, Registration, SessionManager, UserProfile,
};

pub(super) const PASSWORD: &str = "correct horse";

/// Canned reply for one endpoint.
#[derive(Debug, Clone)]
pub(super) enum Scripted {
    Body(Value),
    Status(u16),
    Offline,
}

/// Scoring double that answers from a script and records every request.
#[derive(Default)]
pub(super) struct ScriptedScoring {
    replies: Mutex<HashMap<Endpoint, Scripted>>,
    calls: Mutex<Vec<(Endpoint, Value)>>,
}

impl ScriptedScoring {
    pub(super) fn with(self, endpoint: Endpoint, reply: Scripted) -> Self {
        self.set(endpoint, reply);
        self
    }

    pub(super) fn set(&self, endpoint: Endpoint, reply: Scripted) {
        self.replies
            .lock()
            .expect("script mutex poisoned")
            .insert(endpoint, reply);
    }

    pub(super) fn replying(endpoint: Endpoint, body: Value) -> Self {
        Self::default().with(endpoint, Scripted::Body(body))
    }

    pub(super) fn calls(&self) -> Vec<(Endpoint, Value)> {
        self.calls.lock().expect("call mutex poisoned").clone()
    }

    pub(super) fn calls_to(&self, endpoint: Endpoint) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(called, _)| *called == endpoint)
            .map(|(_, body)| body)
            .collect()
    }
}

#[async_trait]
impl ScoringService for ScriptedScoring {
    async fn post(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ScoringClientError> {
        self.calls
            .lock()
            .expect("call mutex poisoned")
            .push((endpoint, body.clone()));
        let reply = self
            .replies
            .lock()
            .expect("script mutex poisoned")
            .get(&endpoint)
            .cloned();
        match reply {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Status(status)) => Err(ScoringClientError::Status {
                status,
                body: "{\"error\": \"scripted failure\"}".to_string(),
            }),
            Some(Scripted::Offline) | None => {
                Err(ScoringClientError::Network("connection refused".to_string()))
            }
        }
    }
}

/// Scoring double whose calls never complete.
#[derive(Default)]
pub(super) struct PendingScoring {
    calls: Mutex<usize>,
}

impl PendingScoring {
    pub(super) fn calls(&self) -> usize {
        *self.calls.lock().expect("call mutex poisoned")
    }
}

#[async_trait]
impl ScoringService for PendingScoring {
    async fn post(&self, _endpoint: Endpoint, _body: &Value) -> Result<Value, ScoringClientError> {
        *self.calls.lock().expect("call mutex poisoned") += 1;
        std::future::pending().await
    }
}

/// Identity double accepting a single shared password.
#[derive(Default)]
pub(super) struct MemoryIdentity {
    accounts: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn verify(&self, credentials: &Credentials) -> Result<UserProfile, IdentityError> {
        if credentials.password != PASSWORD {
            return Err(IdentityError::InvalidCredentials);
        }
        let name = self
            .accounts
            .lock()
            .expect("account mutex poisoned")
            .get(&credentials.email)
            .cloned();
        Ok(UserProfile {
            email: credentials.email.clone(),
            name,
        })
    }

    async fn register(&self, registration: &Registration) -> Result<UserProfile, IdentityError> {
        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        if accounts.contains_key(&registration.email) {
            return Err(IdentityError::AlreadyExists);
        }
        accounts.insert(registration.email.clone(), registration.name.clone());
        Ok(UserProfile {
            email: registration.email.clone(),
            name: Some(registration.name.clone()),
        })
    }
}

pub(super) fn importer_fields() -> Map<String, Value> {
    let fields = json!({
        "importerLicenseId": "IMP042",
        "hsCode": "280800",
        "chemicalName": "Nitric acid; sulphonitric acids",
        "countryOfOrigin": "India",
        "importationDescription": "Used in fertilizer manufacturing & explosives production",
        "complianceHistory": "Poor",
        "financialStability": "Low",
        "importFrequency": 12,
        "importVolume": "5400.5",
        "pastViolations": 2
    });
    match fields {
        Value::Object(map) => map,
        _ => unreachable!("literal is an object"),
    }
}

pub(super) fn filled_importer() -> ImporterAssessment {
    let mut form = ImporterAssessment::default();
    form.form_mut()
        .apply_json(&importer_fields())
        .expect("fields apply");
    form
}

pub(super) fn importer_reply() -> Value {
    json!({
        "risk_category": "Risky",
        "risk_probability": 0.8731,
        "xai_method": "lime",
        "xai_explanations": {
            "feature_importance": [
                { "feature": "pastViolations > 1.00", "importance": 0.31 },
                { "feature": "complianceHistory=Poor", "importance": 0.22 }
            ],
            "model_confidence": 0.64
        }
    })
}

pub(super) fn shap_reply() -> Value {
    json!({
        "shap_explanations": {
            "top_features": [
                { "feature": "importVolume", "shap_value": 0.42 },
                { "feature": "financialStability", "shap_value": 0.18 },
                { "feature": "hsCode", "shap_value": -0.05 }
            ],
            "plot": ""
        }
    })
}

pub(super) fn dashboard(
    scoring: Arc<ScriptedScoring>,
) -> (axum::Router, Arc<SessionManager<MemoryIdentity>>) {
    let sessions = Arc::new(SessionManager::new(Arc::new(MemoryIdentity::default())));
    let state = DashboardState {
        assessments: Arc::new(AssessmentService::new(scoring, 5)),
        sessions: Arc::clone(&sessions),
    };
    (dashboard_router(state), sessions)
}

pub(super) fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}
