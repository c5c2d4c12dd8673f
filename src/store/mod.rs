pub mod jsonl;

pub use jsonl::JsonlAbstractStore;

use std::collections::HashMap;

use crate::refine::error::RefineError;

/// Read-only lookup from reference id to its text.
///
/// `Ok(None)` means the id is unknown; an empty string is returned as-is and
/// left for the caller to reject.
pub trait ReferenceStore: Send + Sync {
    fn lookup(&self, id: &str) -> Result<Option<String>, RefineError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    texts: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(id.into(), text.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = MemoryStore::new();
        for (id, text) in iter {
            store.insert(id, text);
        }
        store
    }
}

impl ReferenceStore for MemoryStore {
    fn lookup(&self, id: &str) -> Result<Option<String>, RefineError> {
        Ok(self.texts.get(id).cloned())
    }

    fn len(&self) -> usize {
        self.texts.len()
    }
}
