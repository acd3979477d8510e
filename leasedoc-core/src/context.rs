//! Cancellation and deadline signal passed to every store operation.
//!
//! A [`Context`] is cheap to clone; clones share the same cancellation flag. Operations check
//! the context on entry and race their waits (lock acquisition, backoff sleeps) against it.
//! Once a backend has begun mutating its state it finishes the mutation, so a cancelled
//! operation either did nothing or completed entirely.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Notify, time::Instant};

use crate::error::{DocumentStoreError, DocumentStoreResult};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Handle used to cancel every [`Context`] derived from the same root.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    state: Arc<CancelState>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a copy of this context that additionally expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy of this context that additionally expires at `deadline`.
    ///
    /// An earlier deadline already present on `self` is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            state: self.state.clone(),
            deadline: Some(match self.deadline {
                Some(existing) => existing.min(deadline),
                None => deadline,
            }),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: self.state.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`DocumentStoreError::Cancelled`] if the context is cancelled or expired.
    pub fn check(&self) -> DocumentStoreResult<()> {
        if self.is_cancelled() {
            return Err(DocumentStoreError::Cancelled("context cancelled".into()));
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DocumentStoreError::Cancelled("deadline exceeded".into()));
            }
        }

        Ok(())
    }

    /// Drives `fut` to completion unless the context is cancelled or expires first.
    ///
    /// When the context wins the race, `fut` is dropped and a
    /// [`DocumentStoreError::Cancelled`] is returned.
    pub async fn guard<F: Future>(&self, fut: F) -> DocumentStoreResult<F::Output> {
        self.check()?;

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            output = fut => Ok(output),
            _ = self.cancelled() => Err(DocumentStoreError::Cancelled("context cancelled".into())),
            _ = expired => Err(DocumentStoreError::Cancelled("deadline exceeded".into())),
        }
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();

            if self.is_cancelled() {
                return;
            }

            notified.await;
        }
    }
}
