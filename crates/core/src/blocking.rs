//! Off-runtime execution of SQLite work
//!
//! Every rusqlite call blocks its thread. Async callers hand that work to
//! tokio's blocking pool so a slow query or a contended connection lock
//! never stalls a runtime worker.

use crate::error::{Error, Result};

/// Run `work` on the blocking pool and wait for its result
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Task(format!("spawn_blocking failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_result_is_passed_through() {
        assert_eq!(run_blocking(|| Ok(7)).await.unwrap(), 7);

        let err = run_blocking::<(), _>(|| Err(Error::Unauthorized))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }

    #[tokio::test]
    async fn test_panic_becomes_task_error() {
        let err = run_blocking::<(), _>(|| panic!("boom")).await.unwrap_err();
        assert!(matches!(err, Error::Task(_)));
    }
}
