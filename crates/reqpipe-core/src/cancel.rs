//! Per-key cancellation registry: latest request wins.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// Tracks one cancellation token per request key.
///
/// Registering a key that already holds a live token cancels the prior
/// token first, so at most one non-cancelled token exists per key. This is
/// the mechanism behind "latest request wins" for rapid repeated calls
/// (type-ahead search and the like).
#[derive(Debug, Default)]
pub struct CancelRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token under `key`, cancelling any prior one.
    pub fn register(&self, key: &str) -> CancellationToken {
        let token = CancellationToken::new();
        let mut tokens = self
            .tokens
            .lock()
            .expect("cancel registry lock is not poisoned");
        if let Some(prior) = tokens.insert(key.to_string(), token.clone()) {
            prior.cancel();
        }
        token
    }

    /// Cancel and drop the token for `key`.
    pub fn cancel(&self, key: &str) {
        let removed = self
            .tokens
            .lock()
            .expect("cancel registry lock is not poisoned")
            .remove(key);
        if let Some(token) = removed {
            token.cancel();
        }
    }

    /// Cancel and drop every registered token.
    pub fn cancel_all(&self) {
        let drained: Vec<CancellationToken> = self
            .tokens
            .lock()
            .expect("cancel registry lock is not poisoned")
            .drain()
            .map(|(_, token)| token)
            .collect();
        for token in drained {
            token.cancel();
        }
    }

    /// Drop entries whose token is already cancelled.
    pub fn prune(&self) {
        self.tokens
            .lock()
            .expect("cancel registry lock is not poisoned")
            .retain(|_, token| !token.is_cancelled());
    }

    pub fn len(&self) -> usize {
        self.tokens
            .lock()
            .expect("cancel registry lock is not poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
