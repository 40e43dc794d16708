//! Delegated login and logout

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use snapseek_core::models::{CallbackParams, LoginState};
use snapseek_core::{run_blocking, Provider};

use crate::error::ApiError;
use crate::state::AppState;

fn login_failed(state: &AppState) -> Response {
    Redirect::to(&state.config.login_failure_url).into_response()
}

/// `GET /auth/{provider}`
pub async fn begin(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let provider: Provider = match provider.parse() {
        Ok(provider) => provider,
        Err(e) => {
            warn!(error = %e, "Login requested for unknown provider");
            return login_failed(&state);
        }
    };

    let auth = Arc::clone(&state.auth);
    let db = Arc::clone(&state.db);
    let outcome = match run_blocking(move || Ok(auth.begin(db.as_ref(), provider))).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(%provider, error = %e, "Could not start login");
            return login_failed(&state);
        }
    };

    match outcome {
        LoginState::ProviderRedirected { authorize_url, .. } => {
            Redirect::to(&authorize_url).into_response()
        }
        LoginState::Failed { provider, reason } => {
            warn!(%provider, %reason, "Could not start login");
            login_failed(&state)
        }
        other => {
            error!(state = other.name(), "Unexpected login state after begin");
            login_failed(&state)
        }
    }
}

/// `GET /auth/{provider}/callback`
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let provider: Provider = match provider.parse() {
        Ok(provider) => provider,
        Err(e) => {
            warn!(error = %e, "Callback for unknown provider");
            return login_failed(&state);
        }
    };

    match state
        .auth
        .handle_callback(Arc::clone(&state.db), provider, params)
        .await
    {
        LoginState::Authenticated { user, session, .. } => {
            let cookie = match state.cookies.set_cookie(session.id) {
                Ok(cookie) => cookie,
                Err(e) => {
                    error!(error = %e, "Could not build session cookie");
                    return login_failed(&state);
                }
            };
            info!(user_id = %user.id, %provider, "User signed in");
            (
                AppendHeaders([(SET_COOKIE, cookie)]),
                Redirect::to(&state.config.login_success_url),
            )
                .into_response()
        }
        LoginState::Failed { provider, reason } => {
            warn!(%provider, %reason, "Login failed");
            login_failed(&state)
        }
        other => {
            error!(state = other.name(), "Login callback ended in a non-terminal state");
            login_failed(&state)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutQuery {
    /// End every session of the signed-in user, not just this one
    #[serde(default)]
    all: bool,
}

fn logout_query(
    query: Result<Query<LogoutQuery>, QueryRejection>,
) -> Result<LogoutQuery, ApiError> {
    query
        .map(|Query(query)| query)
        .map_err(|_| ApiError::BadRequest("all must be true or false.".into()))
}

/// Destroy the caller's session, if any, and build the clearing cookie
async fn end_session(
    state: &AppState,
    headers: &HeaderMap,
    query: LogoutQuery,
) -> Result<AppendHeaders<[(HeaderName, HeaderValue); 1]>, ApiError> {
    if let Some(token) = state.session_token(headers) {
        let sessions = state.sessions();
        let db = Arc::clone(&state.db);
        run_blocking(move || {
            if query.all {
                if let Some(user_id) = sessions.resolve(db.as_ref(), token)? {
                    let removed = sessions.destroy_all(db.as_ref(), user_id)?;
                    info!(%user_id, removed, "Signed out of every session");
                    return Ok(());
                }
            }
            sessions.destroy(db.as_ref(), token)
        })
        .await
        .map_err(|e| ApiError::from(e).or_internal("Could not log out."))?;
    }

    let cookie = state.cookies.clear_cookie().map_err(|e| {
        error!(error = %e, "Could not build clearing cookie");
        ApiError::Internal("Could not log out.")
    })?;
    Ok(AppendHeaders([(SET_COOKIE, cookie)]))
}

/// `POST /auth/logout[?all=true]`
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<LogoutQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let clear = end_session(&state, &headers, logout_query(query)?).await?;
    Ok((
        StatusCode::OK,
        clear,
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response())
}

/// `GET /auth/logout[?all=true]`
pub async fn logout_redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<LogoutQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let clear = end_session(&state, &headers, logout_query(query)?).await?;
    Ok((clear, Redirect::to(state.config.frontend_url())).into_response())
}
