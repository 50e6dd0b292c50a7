//! Reference-counted loading state for spinner/UI gating.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct LoadingInner {
    keys: HashMap<String, usize>,
    global: usize,
}

/// Tracks outstanding requests per key plus a global count.
///
/// Counts are reference counts, not booleans: two overlapping requests
/// under one key keep `is_loading` true until both settle.
#[derive(Debug, Clone, Default)]
pub struct LoadingTracker {
    inner: Arc<Mutex<LoadingInner>>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request as outstanding. The returned guard releases the
    /// count when dropped, on success and failure paths alike.
    pub fn begin(&self, key: Option<&str>) -> LoadingGuard {
        let mut inner = self
            .inner
            .lock()
            .expect("loading tracker lock is not poisoned");
        inner.global += 1;
        if let Some(key) = key {
            *inner.keys.entry(key.to_string()).or_insert(0) += 1;
        }
        LoadingGuard {
            tracker: self.inner.clone(),
            key: key.map(ToString::to_string),
        }
    }

    /// Whether any request (no key) or any request under `key` is outstanding.
    pub fn is_loading(&self, key: Option<&str>) -> bool {
        self.active(key) > 0
    }

    pub fn active(&self, key: Option<&str>) -> usize {
        let inner = self
            .inner
            .lock()
            .expect("loading tracker lock is not poisoned");
        match key {
            None => inner.global,
            Some(key) => inner.keys.get(key).copied().unwrap_or(0),
        }
    }

    /// Drop all counts. Outstanding guards become no-ops on release.
    pub fn clear(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("loading tracker lock is not poisoned");
        inner.keys.clear();
        inner.global = 0;
    }

    /// Run a future with the loading count held for its whole duration.
    pub async fn wrap<F: std::future::Future>(&self, key: Option<&str>, fut: F) -> F::Output {
        let _guard = self.begin(key);
        fut.await
    }
}

/// RAII release handle returned by [`LoadingTracker::begin`].
#[derive(Debug)]
pub struct LoadingGuard {
    tracker: Arc<Mutex<LoadingInner>>,
    key: Option<String>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut inner = self
            .tracker
            .lock()
            .expect("loading tracker lock is not poisoned");
        inner.global = inner.global.saturating_sub(1);
        if let Some(key) = &self.key {
            if let Some(count) = inner.keys.get_mut(key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    inner.keys.remove(key);
                }
            }
        }
    }
}
