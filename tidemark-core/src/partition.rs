//! Plain per-partition token sets.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::token::SessionToken;

/// Partition id of the implicit single partition used by legacy headers.
pub const DEFAULT_PARTITION_ID: &str = "0";

/// An immutable-by-convention map from partition id to session token.
///
/// This is the decoded form of one session-token header and the value type
/// snapshots are built from. Keys iterate in ascending order, which is also
/// the order the partitioned wire format emits them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionTokens {
    tokens: BTreeMap<String, SessionToken>,
}

impl PartitionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `token` into the entry for `partition_id`, inserting if absent.
    pub fn merge_token(&mut self, partition_id: impl Into<String>, token: SessionToken) {
        match self.tokens.entry(partition_id.into()) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().merge_in(&token),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(token);
            }
        }
    }

    /// Merge every entry of `other` into this set.
    pub fn merge_all(&mut self, other: &PartitionTokens) {
        for (partition_id, token) in other.iter() {
            self.merge_token(partition_id, token.clone());
        }
    }

    pub fn get(&self, partition_id: &str) -> Option<&SessionToken> {
        self.tokens.get(partition_id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate entries in ascending partition id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SessionToken)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn partition_ids(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// Whether every partition in `other` is tracked here with a dominating token.
    pub fn dominates(&self, other: &PartitionTokens) -> bool {
        other
            .iter()
            .all(|(pid, token)| self.get(pid).is_some_and(|own| own.dominates(token)))
    }
}

impl FromIterator<(String, SessionToken)> for PartitionTokens {
    fn from_iter<I: IntoIterator<Item = (String, SessionToken)>>(iter: I) -> Self {
        let mut tokens = PartitionTokens::new();
        for (pid, token) in iter {
            tokens.merge_token(pid, token);
        }
        tokens
    }
}

impl IntoIterator for PartitionTokens {
    type Item = (String, SessionToken);
    type IntoIter = btree_map::IntoIter<String, SessionToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_token_advances_only() {
        let mut tokens = PartitionTokens::new();
        tokens.merge_token("P1", SessionToken::simple(5));
        tokens.merge_token("P1", SessionToken::simple(3));
        assert_eq!(tokens.get("P1"), Some(&SessionToken::simple(5)));
        tokens.merge_token("P1", SessionToken::simple(9));
        assert_eq!(tokens.get("P1"), Some(&SessionToken::simple(9)));
    }

    #[test]
    fn test_from_iter_merges_duplicates() {
        let tokens: PartitionTokens = vec![
            ("b".to_string(), SessionToken::simple(1)),
            ("a".to_string(), SessionToken::simple(2)),
            ("b".to_string(), SessionToken::simple(4)),
        ]
        .into_iter()
        .collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.partition_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(tokens.get("b"), Some(&SessionToken::simple(4)));
    }

    #[test]
    fn test_dominates() {
        let mut newer = PartitionTokens::new();
        newer.merge_token("P1", SessionToken::simple(5));
        newer.merge_token("P2", SessionToken::simple(7));
        let mut older = PartitionTokens::new();
        older.merge_token("P1", SessionToken::simple(3));
        assert!(newer.dominates(&older));
        assert!(!older.dominates(&newer));
        assert!(newer.dominates(&PartitionTokens::new()));
    }
}
