//! Search logger and aggregator
//!
//! Writes go through [`log_search`], which validates before touching the
//! store. Reads are per-user history and the global top-terms leaderboard.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::invariants::{
    assert_history_invariants, assert_search_record_invariants, assert_top_terms_invariants,
    assert_user_id_valid,
};
use crate::models::{SearchRecord, SearchTerm, TermCount};
use crate::storage::SearchRepository;

/// Leaderboard size when the caller does not ask for one
pub const DEFAULT_TOP_TERMS: u32 = 5;

/// Upper bound on a requested leaderboard size
pub const MAX_TOP_TERMS: u32 = 100;

/// Validate and durably record one search by `user_id`
#[instrument(skip(store, raw_term))]
pub fn log_search<S>(store: &S, user_id: Uuid, raw_term: &str) -> Result<SearchRecord>
where
    S: SearchRepository + ?Sized,
{
    let term = SearchTerm::parse(raw_term)?;
    log_term(store, user_id, &term)
}

/// Durably record an already validated term
#[instrument(skip(store, term))]
pub fn log_term<S>(store: &S, user_id: Uuid, term: &SearchTerm) -> Result<SearchRecord>
where
    S: SearchRepository + ?Sized,
{
    assert_user_id_valid(user_id, "log_term");
    let record = store.append_search(user_id, term)?;
    assert_search_record_invariants(&record, user_id);
    info!(term = %record.term, "Search logged");
    Ok(record)
}

/// A user's searches, newest first
pub fn history<S>(store: &S, user_id: Uuid) -> Result<Vec<SearchRecord>>
where
    S: SearchRepository + ?Sized,
{
    let records = store.list_searches_for_user(user_id)?;
    assert_history_invariants(&records, user_id);
    Ok(records)
}

/// The most searched terms across all users.
///
/// `None` means [`DEFAULT_TOP_TERMS`]; larger requests are capped at
/// [`MAX_TOP_TERMS`]. Ties are ordered by term.
pub fn top_terms<S>(store: &S, limit: Option<u32>) -> Result<Vec<TermCount>>
where
    S: SearchRepository + ?Sized,
{
    let limit = limit.unwrap_or(DEFAULT_TOP_TERMS).min(MAX_TOP_TERMS);
    let terms = store.top_terms(limit)?;
    assert_top_terms_invariants(&terms, limit);
    Ok(terms)
}
