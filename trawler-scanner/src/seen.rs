use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of URLs already dispatched during one crawl.
///
/// Keys are only ever inserted. The check and the insert happen under a single
/// lock acquisition so two callers can never both see a key as new.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` was already present, `false` if it was just inserted.
    pub fn test_and_set(&self, key: &str) -> bool {
        let mut seen = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(key) {
            return true;
        }
        seen.insert(key.to_string());
        false
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
