use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{Credentials, IdentityProvider, Registration, Session, SessionManager};
use crate::error::AppError;

/// Login, signup, logout, and session lookup. Mounted on any router whose state can
/// hand out the shared [`SessionManager`].
pub fn session_routes<St, I>() -> Router<St>
where
    St: Clone + Send + Sync + 'static,
    Arc<SessionManager<I>>: FromRef<St>,
    I: IdentityProvider + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/session/login", post(login_handler::<I>))
        .route("/api/v1/session/signup", post(signup_handler::<I>))
        .route(
            "/api/v1/session",
            axum::routing::get(current_handler::<I>).delete(logout_handler::<I>),
        )
}

pub(crate) async fn login_handler<I>(
    State(sessions): State<Arc<SessionManager<I>>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Session>, AppError>
where
    I: IdentityProvider + ?Sized + 'static,
{
    let session = sessions.login(&credentials).await?;
    Ok(Json(session))
}

pub(crate) async fn signup_handler<I>(
    State(sessions): State<Arc<SessionManager<I>>>,
    Json(registration): Json<Registration>,
) -> Result<Response, AppError>
where
    I: IdentityProvider + ?Sized + 'static,
{
    let session = sessions.signup(&registration).await?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

pub(crate) async fn current_handler<I>(
    State(sessions): State<Arc<SessionManager<I>>>,
    headers: HeaderMap,
) -> Result<Json<Session>, AppError>
where
    I: IdentityProvider + ?Sized + 'static,
{
    Ok(Json(sessions.authorize(&headers)?))
}

pub(crate) async fn logout_handler<I>(
    State(sessions): State<Arc<SessionManager<I>>>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError>
where
    I: IdentityProvider + ?Sized + 'static,
{
    let session = sessions.authorize(&headers)?;
    sessions.logout(session.token);
    Ok(StatusCode::NO_CONTENT)
}
