//! Per-pass cancellation context.
//!
//! Every collaborator call the engine makes (pod listing, scheduling
//! simulation) is raced against the pass's shutdown signal and deadline.
//! Whichever fires first wins; a cancelled call yields
//! [`DisruptionError::Cancelled`] and is never retried.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{DisruptionError, DisruptionResult};

/// Cancellation signal and deadline shared by one evaluation pass.
#[derive(Debug, Clone)]
pub struct PassContext {
    shutdown: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl PassContext {
    /// A context cancelled when `true` is sent on the shutdown channel.
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown,
            deadline: None,
        }
    }

    /// A context that is never cancelled.
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx)
    }

    /// Cancel the pass once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `fut` unless the pass is cancelled first.
    pub async fn guard<F, T>(&self, fut: F) -> DisruptionResult<T>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(DisruptionError::Cancelled);
        }

        let mut shutdown = self.shutdown.clone();
        let signalled = async move {
            loop {
                if *shutdown.borrow_and_update() {
                    return;
                }
                // Sender gone: no shutdown can ever arrive.
                if shutdown.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        let work = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| DisruptionError::Cancelled),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = signalled => Err(DisruptionError::Cancelled),
            res = work => res,
        }
    }
}
