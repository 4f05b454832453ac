use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::client::{Endpoint, ScoringClientError, ScoringService};
use super::form::FormState;
use super::interpreter::{interpret, Expectation, InterpretError, RiskResult};
use super::lifetime::AbortSignal;
use super::payload::{self, SubmissionPayload};
use super::schema::FormKind;
use super::validation::ValidationErrors;

/// Banner shown for every failure that involved the remote service.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Failed to analyze. Please check your connection and try again.";

/// A form the controller can submit.
pub trait AssessmentForm {
    fn kind(&self) -> FormKind;
    fn endpoint(&self) -> Endpoint;
    fn expectation(&self) -> Expectation;
    /// Recompute and store the form's error map, returning a copy.
    fn validate(&mut self) -> ValidationErrors;
    fn payload(&self) -> Result<SubmissionPayload, ValidationErrors>;
    /// Payload fields kept on the result for risk-factor explanations.
    fn echo(&self, payload: &SubmissionPayload) -> Map<String, Value>;
    /// Called with the reply body once it has been read as a risk result.
    fn on_success(&mut self, _body: &Value) {}
    /// Called when a submission fails for any reason other than cancellation.
    fn on_failure(&mut self) {}
}

impl AssessmentForm for FormState {
    fn kind(&self) -> FormKind {
        self.schema().kind
    }

    fn endpoint(&self) -> Endpoint {
        self.schema().endpoint
    }

    fn expectation(&self) -> Expectation {
        self.schema().expectation
    }

    fn validate(&mut self) -> ValidationErrors {
        FormState::validate(self).clone()
    }

    fn payload(&self) -> Result<SubmissionPayload, ValidationErrors> {
        payload::build(self.schema(), self.fields())
    }

    fn echo(&self, payload: &SubmissionPayload) -> Map<String, Value> {
        self.schema().echo(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailed,
    RemoteError,
    ParseError,
    NetworkError,
    Cancelled,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error("form has invalid fields: {0}")]
    ValidationFailed(ValidationErrors),
    #[error("scoring service responded with status {status}")]
    RemoteError { status: u16 },
    #[error("could not interpret scoring response: {0}")]
    ParseError(#[from] InterpretError),
    #[error("scoring service unreachable: {0}")]
    NetworkError(String),
    #[error("submission cancelled")]
    Cancelled,
    #[error("a submission is already in flight for this form")]
    InFlight,
}

impl SubmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::RemoteError { .. } => ErrorKind::RemoteError,
            Self::ParseError(_) => ErrorKind::ParseError,
            Self::NetworkError(_) => ErrorKind::NetworkError,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InFlight => ErrorKind::InFlight,
        }
    }

    /// Text for the banner above the form. Remote details never reach the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "Please correct the highlighted fields.",
            Self::RemoteError { .. } | Self::ParseError(_) | Self::NetworkError(_) => {
                GENERIC_FAILURE_MESSAGE
            }
            Self::Cancelled => "The submission was cancelled.",
            Self::InFlight => "A submission is already in progress.",
        }
    }
}

impl From<ScoringClientError> for SubmissionError {
    fn from(err: ScoringClientError) -> Self {
        match err {
            ScoringClientError::Status { status, .. } => Self::RemoteError { status },
            ScoringClientError::Network(message) => Self::NetworkError(message),
            ScoringClientError::Timeout => Self::NetworkError("request timed out".to_string()),
        }
    }
}

/// Loading, banner, and last result of one form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionView {
    pub loading: bool,
    pub error: Option<String>,
    pub result: Option<RiskResult>,
}

/// Drives validate, serialize, call, interpret for a single form instance.
pub struct SubmissionController<S: ?Sized> {
    service: Arc<S>,
    signal: AbortSignal,
    loading: AtomicBool,
    view: Mutex<SubmissionView>,
}

impl<S> SubmissionController<S>
where
    S: ScoringService + ?Sized,
{
    pub fn new(service: Arc<S>, signal: AbortSignal) -> Self {
        Self {
            service,
            signal,
            loading: AtomicBool::new(false),
            view: Mutex::new(SubmissionView::default()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn view(&self) -> SubmissionView {
        let mut view = self.lock_view().clone();
        view.loading = self.is_loading();
        view
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    pub async fn submit<F>(&self, form: &mut F) -> Result<RiskResult, SubmissionError>
    where
        F: AssessmentForm + Send + ?Sized,
    {
        if self.signal.is_aborted() {
            return Err(SubmissionError::Cancelled);
        }

        let errors = form.validate();
        if !errors.is_empty() {
            debug!(form = %form.kind(), invalid = errors.len(), "submission blocked by validation");
            let err = SubmissionError::ValidationFailed(errors);
            self.lock_view().error = Some(err.user_message().to_string());
            return Err(err);
        }

        let _loading = LoadingGuard::enter(&self.loading).ok_or(SubmissionError::InFlight)?;
        self.lock_view().error = None;

        let outcome = self.perform(form).await;
        match &outcome {
            Ok(result) => {
                info!(form = %form.kind(), category = result.category.label(), "assessment completed");
                let mut view = self.lock_view();
                view.result = Some(result.clone());
                view.error = None;
            }
            Err(SubmissionError::Cancelled) => {
                debug!(form = %form.kind(), "submission cancelled; outcome discarded");
            }
            Err(err) => {
                form.on_failure();
                let mut view = self.lock_view();
                view.result = None;
                view.error = Some(err.user_message().to_string());
            }
        }
        outcome
    }

    async fn perform<F>(&self, form: &mut F) -> Result<RiskResult, SubmissionError>
    where
        F: AssessmentForm + Send + ?Sized,
    {
        let payload = form.payload().map_err(SubmissionError::ValidationFailed)?;
        let endpoint = form.endpoint();

        let reply = tokio::select! {
            biased;
            _ = self.signal.aborted() => return Err(SubmissionError::Cancelled),
            reply = self.service.post(endpoint, payload.body()) => reply,
        };

        let body = reply.map_err(|err| {
            warn!(endpoint = endpoint.path(), error = %err, "scoring call failed");
            SubmissionError::from(err)
        })?;

        if self.signal.is_aborted() {
            return Err(SubmissionError::Cancelled);
        }

        let result = interpret(&body, form.expectation()).map_err(|err| {
            warn!(endpoint = endpoint.path(), error = %err, body = %body, "unrecognized scoring reply");
            SubmissionError::from(err)
        })?;
        form.on_success(&body);

        Ok(result.with_raw_input(form.echo(&payload)))
    }

    fn lock_view(&self) -> std::sync::MutexGuard<'_, SubmissionView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the loading flag for the duration of a submission.
struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoadingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_guard_rejects_reentry_until_dropped() {
        let flag = AtomicBool::new(false);
        let guard = LoadingGuard::enter(&flag).expect("first entry");
        assert!(LoadingGuard::enter(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(LoadingGuard::enter(&flag).is_some());
    }

    #[test]
    fn remote_failures_share_the_generic_banner() {
        let remote = SubmissionError::from(ScoringClientError::Status {
            status: 503,
            body: "maintenance".to_string(),
        });
        assert_eq!(remote, SubmissionError::RemoteError { status: 503 });
        assert_eq!(remote.user_message(), GENERIC_FAILURE_MESSAGE);

        let timeout = SubmissionError::from(ScoringClientError::Timeout);
        assert_eq!(timeout.kind(), ErrorKind::NetworkError);
        assert_eq!(timeout.user_message(), GENERIC_FAILURE_MESSAGE);
        assert!(!timeout.user_message().contains("503"));
    }
}
