use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::client::ScoringService;
use super::explanation::{ExplanationData, ExplanationMethod};
use super::forms::recipe::RecipeSubmission;
use super::lifetime::AbortSignal;
use super::service::{AssessmentReport, AssessmentService};
use crate::error::AppError;
use crate::session::{session_routes, IdentityProvider, SessionManager};

/// Shared handles behind the dashboard routes.
pub struct DashboardState<S: ?Sized, I: ?Sized> {
    pub assessments: Arc<AssessmentService<S>>,
    pub sessions: Arc<SessionManager<I>>,
}

impl<S: ?Sized, I: ?Sized> Clone for DashboardState<S, I> {
    fn clone(&self) -> Self {
        Self {
            assessments: Arc::clone(&self.assessments),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<S: ?Sized, I: ?Sized> FromRef<DashboardState<S, I>> for Arc<SessionManager<I>> {
    fn from_ref(state: &DashboardState<S, I>) -> Self {
        Arc::clone(&state.sessions)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FieldsRequest {
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImporterRequest {
    fields: Map<String, Value>,
    #[serde(default)]
    explanation_method: Option<ExplanationMethod>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExplanationRequest {
    fields: Map<String, Value>,
    method: ExplanationMethod,
}

/// Session and assessment endpoints. Every assessment route needs a live session.
pub fn dashboard_router<S, I>(state: DashboardState<S, I>) -> Router
where
    S: ScoringService + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    Router::new()
        .merge(session_routes::<DashboardState<S, I>, I>())
        .route("/api/v1/assessments/importer", post(importer_handler::<S, I>))
        .route(
            "/api/v1/assessments/importer/explanation",
            post(explanation_handler::<S, I>),
        )
        .route("/api/v1/assessments/end-user", post(end_user_handler::<S, I>))
        .route("/api/v1/assessments/future", post(future_handler::<S, I>))
        .route("/api/v1/assessments/recipe", post(recipe_handler::<S, I>))
        .with_state(state)
}

pub(crate) async fn importer_handler<S, I>(
    State(state): State<DashboardState<S, I>>,
    headers: HeaderMap,
    Json(request): Json<ImporterRequest>,
) -> Result<Json<AssessmentReport>, AppError>
where
    S: ScoringService + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    state.sessions.authorize(&headers)?;
    let report = state
        .assessments
        .assess_importer(
            &request.fields,
            request.explanation_method,
            AbortSignal::never(),
        )
        .await?;
    Ok(Json(report))
}

pub(crate) async fn explanation_handler<S, I>(
    State(state): State<DashboardState<S, I>>,
    headers: HeaderMap,
    Json(request): Json<ExplanationRequest>,
) -> Result<Json<ExplanationData>, AppError>
where
    S: ScoringService + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    state.sessions.authorize(&headers)?;
    let data = state
        .assessments
        .explain_importer(&request.fields, request.method, AbortSignal::never())
        .await?;
    Ok(Json(data))
}

pub(crate) async fn end_user_handler<S, I>(
    State(state): State<DashboardState<S, I>>,
    headers: HeaderMap,
    Json(request): Json<FieldsRequest>,
) -> Result<Json<AssessmentReport>, AppError>
where
    S: ScoringService + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    state.sessions.authorize(&headers)?;
    let report = state
        .assessments
        .assess_end_user(&request.fields, AbortSignal::never())
        .await?;
    Ok(Json(report))
}

pub(crate) async fn future_handler<S, I>(
    State(state): State<DashboardState<S, I>>,
    headers: HeaderMap,
    Json(request): Json<FieldsRequest>,
) -> Result<Json<AssessmentReport>, AppError>
where
    S: ScoringService + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    state.sessions.authorize(&headers)?;
    let report = state
        .assessments
        .assess_future(&request.fields, AbortSignal::never())
        .await?;
    Ok(Json(report))
}

pub(crate) async fn recipe_handler<S, I>(
    State(state): State<DashboardState<S, I>>,
    headers: HeaderMap,
    Json(submission): Json<RecipeSubmission>,
) -> Result<Json<AssessmentReport>, AppError>
where
    S: ScoringService + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    state.sessions.authorize(&headers)?;
    let report = state
        .assessments
        .analyze_recipe(submission, AbortSignal::never())
        .await?;
    Ok(Json(report))
}
