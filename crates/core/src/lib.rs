//! Snapseek Core Library
//!
//! Core models, storage, sessions, delegated login and the search log for
//! the Snapseek image search service.

pub mod auth;
pub mod blocking;
pub mod error;
pub mod invariants;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod search_log;
pub mod storage;

pub use auth::{AuthCoordinator, SessionManager};
pub use blocking::run_blocking;
pub use error::{Error, Result};
pub use models::*;
pub use pipeline::{run_search, SearchOutcome};
pub use providers::{IdentityProvider, ImageSearch};
pub use storage::{
    Database, LoginAttemptRepository, SearchRepository, Storage, UserRepository,
};
