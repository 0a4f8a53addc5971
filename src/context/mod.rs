// src/context/mod.rs
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::checks::CheckError;

/// Process-wide cancellation authority.
///
/// Cancelling it is observed by every [`Context`] derived from it, including
/// contexts already handed to in-flight work items.
#[derive(Debug)]
pub struct RootContext {
    cancel_tx: watch::Sender<bool>,
}

impl RootContext {
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self { cancel_tx }
    }

    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// A context without a deadline.
    pub fn context(&self) -> Context {
        Context {
            deadline: None,
            cancel_rx: self.cancel_tx.subscribe(),
        }
    }

    /// A context that expires after `timeout`, or earlier on cancellation.
    pub fn with_timeout(&self, timeout: Duration) -> Context {
        Context {
            deadline: Some(Instant::now() + timeout),
            cancel_rx: self.cancel_tx.subscribe(),
        }
    }
}

impl Default for RootContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation and deadline carried by one unit of work.
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel_rx: watch::Receiver<bool>,
}

impl Context {
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves once the root context is cancelled. Never resolves if the
    /// root is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Resolves with the sentinel error of whichever fires first: the
    /// deadline or cancellation.
    pub async fn done(&self) -> CheckError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancelled() => CheckError::Cancelled,
                _ = sleep_until(deadline) => CheckError::DeadlineExceeded,
            },
            None => {
                self.cancelled().await;
                CheckError::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context fires first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, CheckError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let root = RootContext::new();
        let ctx = root.with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.run(async { 42 }).await.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let root = RootContext::new();
        let ctx = root.with_timeout(Duration::from_millis(50));
        let err = ctx
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::DeadlineExceeded));
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_cancel_reaches_derived_contexts() {
        let root = RootContext::new();
        let ctx = root.with_timeout(Duration::from_secs(60));
        let background = root.context();

        let pending = tokio::spawn(async move {
            ctx.run(std::future::pending::<()>()).await
        });
        tokio::task::yield_now().await;
        root.cancel();

        let err = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("cancellation should be prompt")
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, CheckError::Cancelled));
        assert!(background.is_cancelled());
        assert!(root.is_cancelled());
    }

    #[tokio::test]
    async fn test_context_derived_after_cancel_is_done() {
        let root = RootContext::new();
        root.cancel();
        let ctx = root.with_timeout(Duration::from_secs(60));
        assert!(ctx.run(async {}).await.is_err());
    }
}
