use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::warn;

use super::{Credentials, IdentityError, IdentityProvider, Registration, UserProfile};
use crate::assessment::client::{decode_body, directory_url};
use crate::config::ScoringConfig;

/// Verifies credentials against the backend's `/login` and `/signup` endpoints.
#[derive(Debug, Clone)]
pub struct RemoteIdentityProvider {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl RemoteIdentityProvider {
    pub fn new(config: &ScoringConfig) -> Result<Self, IdentityError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        Ok(Self {
            http,
            base_url: directory_url(&config.base_url),
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value), IdentityError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;
        Ok((status, decode_body(&text)))
    }
}

fn reply_message(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn verify(&self, credentials: &Credentials) -> Result<UserProfile, IdentityError> {
        let body = json!({
            "email": credentials.email.trim(),
            "password": credentials.password,
        });
        let (status, reply) = self.post("login", body).await?;

        if status.is_success() {
            Ok(UserProfile {
                email: credentials.email.trim().to_string(),
                name: None,
            })
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(IdentityError::InvalidCredentials)
        } else if status.is_server_error() {
            warn!(%status, "identity service failed");
            Err(IdentityError::Unavailable(reply_message(&reply)))
        } else {
            Err(IdentityError::Rejected(reply_message(&reply)))
        }
    }

    async fn register(&self, registration: &Registration) -> Result<UserProfile, IdentityError> {
        let body = json!({
            "name": registration.name.trim(),
            "email": registration.email.trim(),
            "password": registration.password,
        });
        let (status, reply) = self.post("signup", body).await?;

        if status.is_success() {
            return Ok(UserProfile {
                email: registration.email.trim().to_string(),
                name: Some(registration.name.trim().to_string()),
            });
        }

        let message = reply_message(&reply);
        if status.is_server_error() {
            warn!(%status, "identity service failed");
            Err(IdentityError::Unavailable(message))
        } else if message.to_ascii_lowercase().contains("already exists") {
            Err(IdentityError::AlreadyExists)
        } else {
            Err(IdentityError::Rejected(message))
        }
    }
}
