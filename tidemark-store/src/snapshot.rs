//! Point-in-time copies of store state.

use std::collections::BTreeMap;

use serde::Serialize;
use tidemark_core::{collection_path_from_link, PartitionTokens, TokenFormat};

/// Deep, immutable copy of a session store's state.
///
/// Two snapshots are equal when they carry the same host, the same
/// path/id bindings and the same tokens per collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub host: String,
    /// Collection path to durable id.
    pub bindings: BTreeMap<String, u64>,
    /// Durable id to the tokens tracked for it.
    pub tables: BTreeMap<u64, PartitionTokens>,
}

impl StoreSnapshot {
    /// Tokens tracked for a collection link, if it is bound.
    pub fn tokens_for_path(&self, link: &str) -> Option<&PartitionTokens> {
        let id = self.bindings.get(&collection_path_from_link(link))?;
        self.tables.get(id)
    }

    pub fn tokens_for_id(&self, id: u64) -> Option<&PartitionTokens> {
        self.tables.get(&id)
    }

    /// Header value the store would have produced for `link` at snapshot time.
    pub fn encode_for_path(&self, link: &str, format: TokenFormat) -> String {
        self.tokens_for_path(link)
            .map(|tokens| format.encode(tokens))
            .unwrap_or_default()
    }

    pub fn collection_count(&self) -> usize {
        self.bindings.len()
    }

    /// Render as pretty JSON for diagnostics.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
