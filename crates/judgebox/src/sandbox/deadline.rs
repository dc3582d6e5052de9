//! Deadline-bounded execution
//!
//! Runs an operation against a wall-clock deadline. When the deadline
//! passes, the operation future is dropped first and then the terminate
//! callback is awaited, so callers can release external resources (a
//! running container) that dropping alone does not reach.

use std::future::Future;
use std::time::Duration;

/// How a deadline-bounded operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    /// The operation finished in time
    Finished(T),
    /// The deadline passed and the operation was abandoned
    Expired,
}

impl<T> Completion<T> {
    /// Check whether the deadline passed
    pub fn is_expired(&self) -> bool {
        matches!(self, Completion::Expired)
    }
}

/// Await `operation`, giving up after `deadline`
///
/// `terminate` runs only on expiry.
pub async fn with_deadline<T, F, K, KF>(
    deadline: Duration,
    operation: F,
    terminate: K,
) -> Completion<T>
where
    F: Future<Output = T>,
    K: FnOnce() -> KF,
    KF: Future<Output = ()>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(value) => Completion::Finished(value),
        Err(_) => {
            terminate().await;
            Completion::Expired
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test]
    async fn finished_before_deadline() {
        let terminated = Arc::new(AtomicBool::new(false));
        let flag = terminated.clone();

        let completion = with_deadline(Duration::from_secs(5), async { 42 }, || async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert_eq!(completion, Completion::Finished(42));
        assert!(!terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn expired_runs_terminate() {
        let terminated = Arc::new(AtomicBool::new(false));
        let flag = terminated.clone();

        let completion = with_deadline(
            Duration::from_millis(20),
            std::future::pending::<()>(),
            || async move {
                flag.store(true, Ordering::SeqCst);
            },
        )
        .await;

        assert!(completion.is_expired());
        assert!(terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn operation_dropped_before_terminate() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(dropped.clone());
        let observed = Arc::new(AtomicBool::new(false));
        let seen = observed.clone();
        let dropped_at_terminate = dropped.clone();

        let completion = with_deadline(
            Duration::from_millis(20),
            async move {
                let _guard = guard;
                std::future::pending::<()>().await
            },
            || async move {
                seen.store(dropped_at_terminate.load(Ordering::SeqCst), Ordering::SeqCst);
            },
        )
        .await;

        assert!(completion.is_expired());
        assert!(observed.load(Ordering::SeqCst));
    }
}
