use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Cancellation and deadline for a single evaluation call.
///
/// Every network operation performed on behalf of the call is aborted as soon as the token is
/// cancelled or the deadline passes; the operation then fails with [`Error::Cancelled`] or
/// [`Error::DeadlineExceeded`].
///
/// ```
/// # use std::time::Duration;
/// # use flipt_provider::CallContext;
/// let cx = CallContext::new().with_timeout(Duration::from_millis(500));
/// assert!(cx.deadline().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the call when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Abort the call once `timeout` has elapsed from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abort the call at `deadline`. An earlier deadline already set is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Token aborting the call when cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Instant after which the call fails with [`Error::DeadlineExceeded`].
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if any.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Drive `operation` to completion unless the call is cancelled or its deadline passes first.
    pub(crate) async fn run<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Error::Cancelled),
            _ = deadline => Err(Error::DeadlineExceeded),
            result = operation => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::Error;

    use super::CallContext;

    #[tokio::test]
    async fn completes_without_cancellation() {
        let cx = CallContext::new();
        let result = cx.run(async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let cx = CallContext::new().with_cancellation(token);

        let result = cx.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_operation() {
        let token = CancellationToken::new();
        let cx = CallContext::new().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = cx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn deadline_aborts_slow_operation() {
        let cx = CallContext::new().with_timeout(Duration::from_millis(20));

        let result = cx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }

    #[test]
    fn earlier_deadline_wins() {
        let cx = CallContext::new()
            .with_timeout(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(60));

        assert!(cx.remaining().unwrap() <= Duration::from_millis(10));
    }
}
