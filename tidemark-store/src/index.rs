//! Bidirectional collection path <-> id index.

use std::collections::HashMap;

/// Partial bijection between collection paths and durable collection ids.
///
/// A path can be re-bound to a new id when a collection is deleted and
/// recreated under the same name. [`CollectionIdentityIndex::bind`] reports
/// the ids that lost their binding so the owner can drop their token tables.
#[derive(Debug, Clone, Default)]
pub struct CollectionIdentityIndex {
    by_path: HashMap<String, u64>,
    by_id: HashMap<u64, String>,
}

/// Result of a [`CollectionIdentityIndex::bind`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindOutcome {
    /// Ids whose previous path was taken over by another id.
    pub displaced_ids: Vec<u64>,
    /// Previous path of the bound id, when it was renamed.
    pub renamed_from: Option<String>,
}

impl BindOutcome {
    /// Whether the index changed.
    pub fn is_structural(&self) -> bool {
        !self.displaced_ids.is_empty() || self.renamed_from.is_some()
    }
}

impl CollectionIdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_path(&self, path: &str) -> Option<u64> {
        self.by_path.get(path).copied()
    }

    pub fn resolve_id(&self, id: u64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Whether `id` and `path` are currently bound to each other.
    pub fn is_bound(&self, id: u64, path: &str) -> bool {
        self.by_path.get(path) == Some(&id)
    }

    /// Bind `id` to `path`, overwriting any conflicting association.
    ///
    /// If `path` belonged to another id, that id is removed entirely and
    /// reported in `displaced_ids`. If `id` was known under another path, the
    /// old path is released and reported in `renamed_from`; the id itself
    /// survives the rename.
    pub fn bind(&mut self, id: u64, path: &str) -> BindOutcome {
        let mut outcome = BindOutcome::default();
        if self.is_bound(id, path) {
            return outcome;
        }

        if let Some(previous_id) = self.by_path.remove(path) {
            self.by_id.remove(&previous_id);
            outcome.displaced_ids.push(previous_id);
        }

        if let Some(previous_path) = self.by_id.remove(&id) {
            self.by_path.remove(&previous_path);
            outcome.renamed_from = Some(previous_path);
        }

        self.by_path.insert(path.to_string(), id);
        self.by_id.insert(id, path.to_string());
        outcome
    }

    /// Remove the binding for `path`, returning the id it pointed to.
    pub fn evict_by_path(&mut self, path: &str) -> Option<u64> {
        let id = self.by_path.remove(path)?;
        self.by_id.remove(&id);
        Some(id)
    }

    /// Remove the binding for `id`, returning the path it was bound to.
    pub fn evict_by_id(&mut self, id: u64) -> Option<String> {
        let path = self.by_id.remove(&id)?;
        self.by_path.remove(&path);
        Some(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Iterate `(path, id)` bindings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.by_path.iter().map(|(p, id)| (p.as_str(), *id))
    }

    /// Both directions agree entry for entry.
    pub fn is_consistent(&self) -> bool {
        self.by_path.len() == self.by_id.len()
            && self
                .by_path
                .iter()
                .all(|(path, id)| self.by_id.get(id) == Some(path))
    }
}
