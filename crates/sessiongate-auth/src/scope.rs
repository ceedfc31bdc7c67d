//! Per-request deadline and cancellation

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::repository::RepositoryError;

/// Deadline plus cancellation shared by every repository call of one request
///
/// One scope is created per request and handed to each collaborator call.
/// Dropping the scope cancels it, so it is released exactly once whichever
/// way the request exits.
#[derive(Debug)]
pub struct RequestScope {
    deadline: Instant,
    cancel: CancellationToken,
}

impl RequestScope {
    pub fn new(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Handle that lets another task cancel this scope (client went away)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a collaborator call under this scope
    ///
    /// Deadline → `RepositoryError::Timeout`, cancellation →
    /// `RepositoryError::Cancelled`. The inner future is dropped in both cases.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RepositoryError::Cancelled),
            result = tokio::time::timeout_at(self.deadline, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(RepositoryError::Timeout),
            },
        }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_times_out_slow_call() {
        let scope = RequestScope::new(Duration::from_secs(1));

        let result: Result<(), _> = scope
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Timeout)));
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let scope = RequestScope::new(Duration::from_secs(5));

        assert_eq!(scope.run(async { Ok(7) }).await.unwrap(), 7);

        let err = scope
            .run(async { Err::<(), _>(RepositoryError::Duplicate) })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_call() {
        let scope = RequestScope::new(Duration::from_secs(60));
        let token = scope.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result: Result<(), _> = scope
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_scope_rejects_new_calls() {
        let scope = RequestScope::new(Duration::from_secs(5));
        scope.cancel();
        assert!(scope.is_cancelled());

        let result = scope.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(RepositoryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_drop_releases_scope() {
        let scope = RequestScope::new(Duration::from_secs(5));
        let token = scope.cancellation_token();
        assert!(!token.is_cancelled());

        drop(scope);
        assert!(token.is_cancelled());
    }
}
