use std::collections::HashMap;

use parking_lot::RwLock;

use crate::content::Content;

/// Parsed content keyed by ContentID.
///
/// Readers always get a clone. Writers install a whole new value; nothing is
/// mutated in place while the lock is held by someone else.
#[derive(Debug, Default)]
pub struct ContentStore {
    items: RwLock<HashMap<String, Content>>,
}

impl ContentStore {
    pub fn insert(&self, content: Content) {
        let id = content.content_id();
        self.items.write().insert(id, content);
    }

    pub fn get(&self, id: &str) -> Option<Content> {
        self.items.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Sorted IDs of every stored record.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.items.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Copies the record out, applies `f` without holding the lock, then
    /// stores the result. Returns `false` when `id` is unknown.
    ///
    /// Only the single-threaded passes after the parse barrier call this.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut Content)) -> bool {
        let Some(mut content) = self.get(id) else {
            return false;
        };
        f(&mut content);
        self.items.write().insert(id.to_string(), content);
        true
    }
}
