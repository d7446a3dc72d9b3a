//! Cooperative cancellation for in-flight dispatches.
//!
//! # Design
//! A `CancelSource`/`CancelToken` pair over a tokio watch channel. The
//! source side signals with a reason string; every cloned token observes the
//! signal. Cancellation is cooperative: the dispatcher checks the token at
//! its suspension point, so signalling guarantees the caller sees
//! `Cancelled`, not that the wire operation is aborted. Dropping the source
//! without cancelling leaves tokens pending forever — a request whose
//! controller went away simply runs to completion.

use std::fmt;

use tokio::sync::watch;

/// Create a connected source/token pair.
pub fn channel() -> (CancelSource, CancelToken) {
    let (tx, rx) = watch::channel(None);
    (CancelSource { tx }, CancelToken { rx })
}

/// The signalling half. Held by whoever decides when to cancel.
pub struct CancelSource {
    tx: watch::Sender<Option<String>>,
}

impl CancelSource {
    /// Signal cancellation with a human-readable reason. Signalling more
    /// than once keeps the first reason observed by already-resolved waiters;
    /// late observers see the latest.
    pub fn cancel(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Some(reason.into()));
    }

    /// Hand out another token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// The observing half. Cloneable; carried inside a `RequestDescriptor`.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<Option<String>>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The cancellation reason, if already signalled.
    pub fn reason(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Resolve with the reason once cancellation is signalled. Pends forever
    /// if the source is dropped without cancelling.
    pub async fn cancelled(&self) -> String {
        let mut rx = self.rx.clone();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl fmt::Debug for CancelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSource").finish_non_exhaustive()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
