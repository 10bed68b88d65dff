//! Per-collection partition token table.

use dashmap::DashMap;
use parking_lot::RwLock;
use tidemark_core::{PartitionTokens, SessionToken};

/// Concurrent map from partition id to the best-known session token.
///
/// Entries only advance: every write is a merge. Merges into different
/// partitions proceed in parallel on the map's shards.
///
/// `update_gate` groups the partitions of one header. Writers hold it shared
/// while merging a whole header; [`PartitionTokenTable::consistent_tokens`]
/// holds it exclusively, so it never sees half of a header applied.
#[derive(Debug, Default)]
pub struct PartitionTokenTable {
    tokens: DashMap<String, SessionToken>,
    update_gate: RwLock<()>,
}

impl PartitionTokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table seeded from a decoded header.
    pub fn from_tokens(tokens: &PartitionTokens) -> Self {
        let table = Self::new();
        table.merge(tokens);
        table
    }

    /// Merge every partition of `tokens` into the table.
    pub fn merge(&self, tokens: &PartitionTokens) {
        let _gate = self.update_gate.read();
        for (partition_id, token) in tokens.iter() {
            self.merge_one(partition_id, token);
        }
    }

    fn merge_one(&self, partition_id: &str, token: &SessionToken) {
        if let Some(mut current) = self.tokens.get_mut(partition_id) {
            current.merge_in(token);
            return;
        }
        self.tokens
            .entry(partition_id.to_string())
            .and_modify(|current| current.merge_in(token))
            .or_insert_with(|| token.clone());
    }

    /// Copy of the token for one partition.
    pub fn get(&self, partition_id: &str) -> Option<SessionToken> {
        self.tokens.get(partition_id).map(|t| t.value().clone())
    }

    /// Merge of the tokens tracked for `partition_ids`, or `None` if none are.
    pub fn merged_over<'a, I>(&self, partition_ids: I) -> Option<SessionToken>
    where
        I: IntoIterator<Item = &'a str>,
    {
        partition_ids
            .into_iter()
            .filter_map(|pid| self.get(pid))
            .reduce(|acc, token| acc.merge(&token))
    }

    /// Best-effort copy of all entries. Concurrent headers may be partially
    /// visible; each individual token is still one this client observed.
    pub fn tokens(&self) -> PartitionTokens {
        self.tokens
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Copy of all entries that reflects every header either fully or not at all.
    pub fn consistent_tokens(&self) -> PartitionTokens {
        let _gate = self.update_gate.write();
        self.tokens()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::decode_header;

    fn tokens(raw: &str) -> PartitionTokens {
        decode_header(raw).expect("valid header")
    }

    #[test]
    fn test_merge_advances_per_partition() {
        let table = PartitionTokenTable::from_tokens(&tokens("P1:5,P2:3"));
        table.merge(&tokens("P1:3,P2:7"));
        assert_eq!(table.tokens(), tokens("P1:5,P2:7"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_returns_copy() {
        let table = PartitionTokenTable::from_tokens(&tokens("P1:5"));
        let mut copy = table.get("P1").expect("tracked");
        copy.merge_in(&SessionToken::simple(100));
        assert_eq!(table.get("P1"), Some(SessionToken::simple(5)));
        assert_eq!(table.get("P9"), None);
    }

    #[test]
    fn test_merged_over() {
        let table = PartitionTokenTable::from_tokens(&tokens("P1:5,P2:9"));
        assert_eq!(
            table.merged_over(["P1", "P2", "P3"]),
            Some(SessionToken::simple(9))
        );
        assert_eq!(table.merged_over(["P3"]), None);
    }

    #[test]
    fn test_consistent_tokens_matches_tokens_when_quiet() {
        let table = PartitionTokenTable::from_tokens(&tokens("a:1,b:2"));
        assert_eq!(table.consistent_tokens(), table.tokens());
        assert!(!table.is_empty());
    }
}
