//! JSON API

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use snapseek_core::{
    run_blocking, run_search, search_log, ImageResult, SearchRecord, TermCount, User,
    UserRepository,
};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    term: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    limit: Option<u32>,
}

/// `GET /api/me`
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>, ApiError> {
    const NOT_AUTHENTICATED: &str = "Not authenticated";

    let token = state.session_token(&headers);
    let sessions = state.sessions();
    let db = Arc::clone(&state.db);
    let user = run_blocking(move || {
        let user_id = sessions.require(db.as_ref(), token)?;
        db.find_user_by_id(user_id)
    })
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Unauthorized(_) => ApiError::Unauthorized(NOT_AUTHENTICATED),
        other => other,
    })?;

    user.map(Json).ok_or(ApiError::Unauthorized(NOT_AUTHENTICATED))
}

/// `POST /api/search`
///
/// An unreadable body counts as an empty term, so the session check still
/// runs first.
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<ImageResult>>, ApiError> {
    let term = match payload {
        Ok(Json(body)) => body.term.unwrap_or_default(),
        Err(rejection) => {
            debug!(error = %rejection, "Unreadable search body");
            String::new()
        }
    };

    let outcome = run_search(
        Arc::clone(&state.db),
        state.sessions(),
        state.images.as_ref(),
        state.session_token(&headers),
        &term,
    )
    .await?;

    Ok(Json(outcome.results))
}

/// `GET /api/top-searches[?limit=n]`
pub async fn top_searches(
    State(state): State<AppState>,
    query: Result<Query<TopQuery>, QueryRejection>,
) -> Result<Json<Vec<TermCount>>, ApiError> {
    let Query(query) =
        query.map_err(|_| ApiError::BadRequest("limit must be a non-negative integer.".into()))?;

    let db = Arc::clone(&state.db);
    run_blocking(move || search_log::top_terms(db.as_ref(), query.limit))
        .await
        .map(Json)
        .map_err(|e| ApiError::from(e).or_internal("Failed to retrieve top searches."))
}

/// `GET /api/history`
pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SearchRecord>>, ApiError> {
    let token = state.session_token(&headers);
    let sessions = state.sessions();
    let db = Arc::clone(&state.db);
    run_blocking(move || {
        let user_id = sessions.require(db.as_ref(), token)?;
        search_log::history(db.as_ref(), user_id)
    })
    .await
    .map(Json)
    .map_err(|e| ApiError::from(e).or_internal("Failed to retrieve search history."))
}
