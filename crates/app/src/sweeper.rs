//! Background removal of expired sessions and login attempts

use std::time::Duration;

use std::sync::Arc;

use snapseek_core::run_blocking;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::AppState;

/// Sweep every `every`; an interval of zero disables the task.
pub fn spawn(state: AppState, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        info!("Session sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            let sessions = state.sessions();
            let db = Arc::clone(&state.db);
            if let Err(e) = run_blocking(move || sessions.sweep(db.as_ref())).await {
                warn!(error = %e, "Session sweep failed");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use snapseek_core::{
        AuthCoordinator, Database, ImageResult, ImageSearch, SearchTerm, SessionManager,
    };

    use crate::config::Config;

    struct NoImages;

    #[async_trait]
    impl ImageSearch for NoImages {
        async fn search(&self, _term: &SearchTerm) -> snapseek_core::Result<Vec<ImageResult>> {
            Ok(Vec::new())
        }
    }

    fn state() -> AppState {
        let config = Config {
            session_secret: "0123456789abcdef0123456789abcdef".into(),
            ..Config::default()
        };
        AppState::new(
            config,
            Database::open_in_memory().unwrap(),
            AuthCoordinator::new(SessionManager::default()),
            Arc::new(NoImages),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_zero_interval_disables() {
        assert!(spawn(state(), Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_task_runs_until_aborted() {
        let handle = spawn(state(), Duration::from_millis(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
