use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ScoringConfig;

/// Endpoints of the remote prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Future-trend forecast.
    Predict,
    ImporterRisk,
    ExplainLime,
    ExplainShap,
    /// Recipe / chemical-combination analysis.
    Analyze,
    /// End-user purchase pattern scoring.
    PredictRisk,
}

impl Endpoint {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Predict => "predict",
            Self::ImporterRisk => "importer-risk",
            Self::ExplainLime => "explain-prediction",
            Self::ExplainShap => "explain-prediction-shap",
            Self::Analyze => "analyze",
            Self::PredictRisk => "predict-risk",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringClientError {
    #[error("scoring service returned status {status}")]
    Status { status: u16, body: String },
    #[error("scoring request failed: {0}")]
    Network(String),
    #[error("scoring request timed out")]
    Timeout,
}

/// Seam over the remote prediction service so forms can be exercised without HTTP.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// POST `body` as JSON and return the decoded reply. Replies that are not JSON come
    /// back as `Value::String` so the interpreter can still inspect them.
    async fn post(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ScoringClientError>;
}

/// reqwest-backed client for the scoring service.
#[derive(Debug, Clone)]
pub struct HttpScoringClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpScoringClient {
    pub fn new(config: &ScoringConfig) -> Result<Self, ScoringClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| ScoringClientError::Network(err.to_string()))?;

        Ok(Self {
            http,
            base_url: directory_url(&config.base_url),
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<reqwest::Url, ScoringClientError> {
        self.base_url
            .join(endpoint.path())
            .map_err(|err| ScoringClientError::Network(err.to_string()))
    }
}

#[async_trait]
impl ScoringService for HttpScoringClient {
    async fn post(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ScoringClientError> {
        let url = self.endpoint_url(endpoint)?;
        debug!(%url, "posting assessment payload");

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(ScoringClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(decode_body(&text))
    }
}

pub(crate) fn map_transport_error(err: reqwest::Error) -> ScoringClientError {
    if err.is_timeout() {
        ScoringClientError::Timeout
    } else {
        ScoringClientError::Network(err.to_string())
    }
}

/// Base URL with a trailing slash so relative joins append instead of replacing.
pub(crate) fn directory_url(base: &reqwest::Url) -> reqwest::Url {
    let mut url = base.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

pub(crate) fn decode_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
