//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock).

use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ExternalProfile, LoginAttempt, Provider, SearchRecord, SearchTerm, Session, TermCount, User,
};

/// User, identity binding and session operations
pub trait UserRepository {
    /// Find user by ID
    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find the user owning a provider identity
    fn find_user_by_external_id(&self, provider: Provider, external_id: &str)
        -> Result<Option<User>>;

    /// Return the owner of a provider identity, creating it when absent
    fn find_or_create_user(&self, profile: &ExternalProfile) -> Result<(User, bool)>;

    /// Update user's last login time
    fn update_last_login(&self, user_id: Uuid) -> Result<()>;

    /// Create a session
    fn create_session(&self, session: &Session) -> Result<()>;

    /// Find a valid (non-expired) session
    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Delete a session
    fn delete_session(&self, session_id: Uuid) -> Result<bool>;

    /// Delete all sessions for a user
    fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64>;

    /// Clean up expired sessions
    fn cleanup_expired_sessions(&self) -> Result<u64>;
}

/// Search log operations
pub trait SearchRepository {
    /// Append a search record
    fn append_search(&self, user_id: Uuid, term: &SearchTerm) -> Result<SearchRecord>;

    /// List a user's searches, newest first
    fn list_searches_for_user(&self, user_id: Uuid) -> Result<Vec<SearchRecord>>;

    /// Most frequent terms across all users
    fn top_terms(&self, limit: u32) -> Result<Vec<TermCount>>;
}

/// Pending provider login operations
pub trait LoginAttemptRepository {
    /// Record a redirect to a provider
    fn create_login_attempt(&self, attempt: &LoginAttempt) -> Result<()>;

    /// Consume a pending attempt by its state value
    fn take_login_attempt(&self, state: &str) -> Result<Option<LoginAttempt>>;

    /// Clean up expired attempts
    fn cleanup_expired_login_attempts(&self) -> Result<u64>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations must be shareable across request tasks.
pub trait Storage:
    UserRepository + SearchRepository + LoginAttemptRepository + Send + Sync
{
}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where
    T: UserRepository + SearchRepository + LoginAttemptRepository + Send + Sync
{
}
