use crate::assessment::controller::SubmissionError;
use crate::assessment::service::AssessmentError;
use crate::assessment::{ExplanationError, FormError, ScoringClientError};
use crate::config::ConfigError;
use crate::session::{IdentityError, SessionError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Assessment(AssessmentError),
    Session(SessionError),
    Scoring(ScoringClientError),
    Csv(csv::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Assessment(err) => write!(f, "assessment error: {}", err),
            AppError::Session(err) => write!(f, "session error: {}", err),
            AppError::Scoring(err) => write!(f, "scoring client error: {}", err),
            AppError::Csv(err) => write!(f, "batch file error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Assessment(err) => Some(err),
            AppError::Session(err) => Some(err),
            AppError::Scoring(err) => Some(err),
            AppError::Csv(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Assessment(err) => assessment_response(err),
            AppError::Session(err) => session_response(err),
            other => {
                let body = Json(json!({ "error": other.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

fn assessment_response(err: AssessmentError) -> Response {
    match err {
        AssessmentError::Form(err) => {
            let body = Json(json!({ "error": err.to_string() }));
            (StatusCode::BAD_REQUEST, body).into_response()
        }
        AssessmentError::Submission(err) => submission_response(err),
        AssessmentError::Explanation(ExplanationError::UnknownMethod(method)) => {
            let body = Json(json!({ "error": format!("unknown explanation method '{method}'") }));
            (StatusCode::BAD_REQUEST, body).into_response()
        }
        AssessmentError::Explanation(ExplanationError::NoPrediction) => {
            let body = Json(json!({ "error": ExplanationError::NoPrediction.to_string() }));
            (StatusCode::CONFLICT, body).into_response()
        }
        AssessmentError::Explanation(ExplanationError::Cancelled) => {
            submission_response(SubmissionError::Cancelled)
        }
        AssessmentError::Explanation(_) => {
            let body = Json(json!({ "error": crate::assessment::controller::GENERIC_FAILURE_MESSAGE }));
            (StatusCode::BAD_GATEWAY, body).into_response()
        }
    }
}

fn submission_response(err: SubmissionError) -> Response {
    let status = match &err {
        SubmissionError::ValidationFailed(errors) => {
            let body = Json(json!({
                "error": err.user_message(),
                "fields": errors,
                "summary": errors.summary(),
            }));
            return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
        }
        SubmissionError::RemoteError { .. }
        | SubmissionError::ParseError(_)
        | SubmissionError::NetworkError(_) => StatusCode::BAD_GATEWAY,
        SubmissionError::InFlight => StatusCode::CONFLICT,
        SubmissionError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = Json(json!({ "error": err.user_message() }));
    (status, body).into_response()
}

fn session_response(err: SessionError) -> Response {
    let status = match &err {
        SessionError::MissingField(_) => StatusCode::BAD_REQUEST,
        SessionError::MissingToken
        | SessionError::InvalidToken
        | SessionError::Identity(IdentityError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
        SessionError::Identity(IdentityError::AlreadyExists) => StatusCode::CONFLICT,
        SessionError::Identity(IdentityError::Rejected(_)) => StatusCode::BAD_REQUEST,
        SessionError::Identity(IdentityError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
    };

    let body = Json(json!({ "error": err.to_string() }));
    (status, body).into_response()
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<AssessmentError> for AppError {
    fn from(value: AssessmentError) -> Self {
        Self::Assessment(value)
    }
}

impl From<FormError> for AppError {
    fn from(value: FormError) -> Self {
        Self::Assessment(AssessmentError::Form(value))
    }
}

impl From<SubmissionError> for AppError {
    fn from(value: SubmissionError) -> Self {
        Self::Assessment(AssessmentError::Submission(value))
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<ScoringClientError> for AppError {
    fn from(value: ScoringClientError) -> Self {
        Self::Scoring(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}
