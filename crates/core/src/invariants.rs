//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{SearchRecord, TermCount};

/// Validate that a freshly written search record is well formed
pub fn assert_search_record_invariants(record: &SearchRecord, owner: Uuid) {
    debug_assert!(
        record.user_id == owner,
        "Search record {} belongs to {} but was written for {}",
        record.id,
        record.user_id,
        owner
    );

    debug_assert!(
        !record.term.is_empty() && record.term.trim() == record.term,
        "Search record {} has untrimmed or empty term {:?}",
        record.id,
        record.term
    );
}

/// Validate that a history listing is scoped and strictly newest-first
pub fn assert_history_invariants(records: &[SearchRecord], owner: Uuid) {
    debug_assert!(
        records.iter().all(|r| r.user_id == owner),
        "History for {} contains foreign records",
        owner
    );

    debug_assert!(
        records.windows(2).all(|w| w[0].timestamp > w[1].timestamp),
        "History for {} is not strictly newest-first",
        owner
    );
}

/// Validate that a leaderboard is bounded and ranked
pub fn assert_top_terms_invariants(terms: &[TermCount], limit: u32) {
    debug_assert!(
        terms.len() <= limit as usize,
        "Top terms returned {} entries for limit {}",
        terms.len(),
        limit
    );

    debug_assert!(
        terms.windows(2).all(|w| w[0].count >= w[1].count),
        "Top terms are not ordered by count"
    );
}

/// Validate that a user ID is not nil
pub fn assert_user_id_valid(user_id: Uuid, context: &str) {
    debug_assert!(
        user_id != Uuid::nil(),
        "Nil user_id in context: {}",
        context
    );
}
