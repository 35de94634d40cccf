//! Cooperative cancellation, per spec section 5: a single request threads
//! a cancellation token through every repository and service call, checked
//! before each file I/O step and before each encryption.
//!
//! No async runtime here (the core is synchronous, single-process — see
//! `DESIGN.md`); the token is just a shared flag polled at well-known
//! points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Cancelled` if the token has been tripped. Call this before
    /// each file I/O step and before each encryption; a cancellation
    /// observed after a commit point (an atomic rename) is not honored.
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_trips_the_check() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(token.check(), Err(CoreError::Cancelled)));
    }

    #[test]
    fn clones_share_the_same_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
