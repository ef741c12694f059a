//! Per-operation execution context.
//!
//! Durable writes and the bootstrap scan are the only operations that wait on
//! I/O. Callers bound them with an [`OpContext`] carrying a deadline and/or a
//! cancellation signal; an operation that outlives either reports
//! [`StoreError::Cancelled`] or [`StoreError::TimedOut`].
//!
//! ```
//! use std::time::Duration;
//! use credstore::OpContext;
//!
//! let (handle, ctx) = OpContext::cancellable();
//! let ctx = ctx.and_timeout(Duration::from_secs(5));
//! assert!(!ctx.is_cancelled());
//! handle.cancel();
//! assert!(ctx.is_cancelled());
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::store::StoreError;

/// Deadline and cancellation signal for a single store operation.
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    deadline: Option<(Instant, Duration)>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`OpContext`] created from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl OpContext {
    /// A context with no deadline that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().and_timeout(timeout)
    }

    /// A context paired with the handle that cancels it.
    pub fn cancellable() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Self {
                deadline: None,
                cancel: Some(rx),
            },
        )
    }

    /// Add (or replace) a deadline `timeout` from now.
    pub fn and_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|(deadline, _)| Instant::now() >= deadline)
    }

    /// Fail fast if the context is already cancelled or expired.
    pub(crate) fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled { operation });
        }
        if let Some((_, after)) = self.deadline
            && self.is_expired()
        {
            return Err(StoreError::TimedOut { operation, after });
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first.
    ///
    /// When the context wins, `fut` is dropped, which aborts the in-flight
    /// backend call.
    pub(crate) async fn run<F, T>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = T>,
    {
        self.check(operation)?;

        let cancel = self.cancel.clone();
        let deadline = self.deadline;

        tokio::select! {
            biased;
            _ = cancelled(cancel) => Err(StoreError::Cancelled { operation }),
            after = expired(deadline) => Err(StoreError::TimedOut { operation, after }),
            out = fut => Ok(out),
        }
    }
}

async fn cancelled(rx: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = rx {
        let signalled = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if signalled {
            return;
        }
    }
    // Sender dropped without cancelling
    std::future::pending::<()>().await
}

async fn expired(deadline: Option<(Instant, Duration)>) -> Duration {
    match deadline {
        Some((at, after)) => {
            tokio::time::sleep_until(at).await;
            after
        }
        None => std::future::pending().await,
    }
}
