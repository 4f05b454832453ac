//! Explicit login sessions. A [`SessionManager`] issues a token once an
//! [`IdentityProvider`] has verified the credentials, and forgets it at logout or
//! expiry. Tokens stay inside this service and are never sent to the scoring backend.

pub mod remote;
pub mod router;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

pub use remote::RemoteIdentityProvider;
pub use router::session_routes;

const DEFAULT_SESSION_TTL_HOURS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: SessionToken,
    pub user: UserProfile,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    AlreadyExists,
    #[error("identity service rejected the request: {0}")]
    Rejected(String),
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Credential verification, delegated to an external collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, credentials: &Credentials) -> Result<UserProfile, IdentityError>;
    async fn register(&self, registration: &Registration) -> Result<UserProfile, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("missing bearer token")]
    MissingToken,
    #[error("session is unknown or has expired")]
    InvalidToken,
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Table of live sessions, shared by the HTTP handlers.
pub struct SessionManager<I: ?Sized> {
    identity: Arc<I>,
    ttl: Duration,
    sessions: Mutex<HashMap<SessionToken, Session>>,
}

impl<I> SessionManager<I>
where
    I: IdentityProvider + ?Sized,
{
    pub fn new(identity: Arc<I>) -> Self {
        Self {
            identity,
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        require("email", &credentials.email)?;
        require("password", &credentials.password)?;

        let user = self.identity.verify(credentials).await?;
        Ok(self.issue(user))
    }

    pub async fn signup(&self, registration: &Registration) -> Result<Session, SessionError> {
        require("name", &registration.name)?;
        require("email", &registration.email)?;
        require("password", &registration.password)?;

        let user = self.identity.register(registration).await?;
        Ok(self.issue(user))
    }

    /// Invalidate `token`. Returns whether a live session was removed.
    pub fn logout(&self, token: SessionToken) -> bool {
        let removed = self.lock().remove(&token).is_some();
        if removed {
            info!(%token, "session ended");
        }
        removed
    }

    pub fn current(&self, token: SessionToken) -> Result<Session, SessionError> {
        let now = Utc::now();
        let mut sessions = self.lock();
        match sessions.get(&token) {
            Some(session) if !session.is_expired_at(now) => Ok(session.clone()),
            Some(_) => {
                sessions.remove(&token);
                debug!(%token, "expired session dropped");
                Err(SessionError::InvalidToken)
            }
            None => Err(SessionError::InvalidToken),
        }
    }

    /// Resolve the session named by an `Authorization: Bearer <token>` header.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let token = bearer_token(headers)?;
        self.current(token)
    }

    pub fn active_sessions(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.lock();
        sessions.retain(|_, session| !session.is_expired_at(now));
        sessions.len()
    }

    fn issue(&self, user: UserProfile) -> Session {
        let issued_at = Utc::now();
        let session = Session {
            token: SessionToken::generate(),
            user,
            issued_at,
            expires_at: issued_at + self.ttl,
        };
        let mut sessions = self.lock();
        sessions.retain(|_, live| !live.is_expired_at(issued_at));
        sessions.insert(session.token, session.clone());
        drop(sessions);
        info!(token = %session.token, user = %session.user.email, "session issued");
        session
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionToken, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require(name: &'static str, value: &str) -> Result<(), SessionError> {
    if value.trim().is_empty() {
        Err(SessionError::MissingField(name))
    } else {
        Ok(())
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<SessionToken, SessionError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(SessionError::MissingToken)?;
    let raw = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or(SessionError::MissingToken)?;
    SessionToken::parse(raw).ok_or(SessionError::InvalidToken)
}
