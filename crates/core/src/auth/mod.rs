//! Session lifecycle and delegated login

mod coordinator;
mod session;

pub use coordinator::AuthCoordinator;
pub use session::{SessionManager, DEFAULT_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS};
