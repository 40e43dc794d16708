//! The protected search operation
//!
//! `resolve session -> validate term -> log search -> call image provider`.
//! The log write commits before the provider is called, and a provider
//! failure never undoes it.

use std::sync::Arc;

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::auth::SessionManager;
use crate::blocking::run_blocking;
use crate::error::Result;
use crate::models::{ImageResult, SearchRecord, SearchTerm};
use crate::providers::ImageSearch;
use crate::search_log;
use crate::storage::Storage;

/// What a successful protected search produced
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub record: SearchRecord,
    pub results: Vec<ImageResult>,
}

/// Storage work runs on the blocking pool; only the provider call is
/// awaited on the runtime.
#[instrument(skip(store, sessions, images, token, raw_term))]
pub async fn run_search<S>(
    store: Arc<S>,
    sessions: SessionManager,
    images: &dyn ImageSearch,
    token: Option<Uuid>,
    raw_term: &str,
) -> Result<SearchOutcome>
where
    S: Storage + ?Sized + 'static,
{
    let raw_term = raw_term.to_owned();
    let (user_id, term, record) = run_blocking(move || {
        let user_id = sessions.require(store.as_ref(), token)?;
        let term = SearchTerm::parse(&raw_term)?;
        let record = search_log::log_term(store.as_ref(), user_id, &term)?;
        Ok((user_id, term, record))
    })
    .await?;

    match images.search(&term).await {
        Ok(results) => Ok(SearchOutcome { record, results }),
        Err(e) => {
            warn!(user_id = %user_id, term = %term, error = %e, "Image search failed after logging");
            Err(e)
        }
    }
}
