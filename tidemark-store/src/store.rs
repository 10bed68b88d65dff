//! The session token store.
//!
//! The store maps collections to their per-partition session tokens. Every
//! response feeds [`SessionTokenStore::update`]; every request asks one of the
//! `resolve*` operations for the header to attach.
//!
//! # Locking
//!
//! One reader/writer lock guards the identity index together with the set of
//! token tables. Updates for an identity that is already bound take it in
//! read mode and merge into the collection's concurrent table. Only new
//! collections, renames, replacements and evictions take it in write mode.
//!
//! The whole state sits behind an `Arc` that [`SessionTokenStore::adopt_state`]
//! swaps in one step, so every operation works on exactly one generation.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tidemark_core::{
    collection_path_from_link, decode_header, RequestIdentity, ResponseMetadata,
    SessionStoreConfig, SessionToken, TidemarkResult, TokenFormat,
};

use crate::index::CollectionIdentityIndex;
use crate::metrics::{SessionStoreMetrics, SessionStoreMetricsSnapshot};
use crate::snapshot::StoreSnapshot;
use crate::table::PartitionTokenTable;

/// What an [`SessionTokenStore::update`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing to apply: empty header or unknown collection identity.
    Skipped,
    /// Merged into an already-bound collection.
    Merged,
    /// Bound a new or changed identity, dropping the tables of `evicted_ids`.
    Rebound { evicted_ids: Vec<u64> },
}

/// Identity index plus the token tables it owns.
#[derive(Debug, Default)]
struct Registry {
    index: CollectionIdentityIndex,
    tables: HashMap<u64, Arc<PartitionTokenTable>>,
}

impl Registry {
    fn table_for(&self, identity: &RequestIdentity) -> Option<&Arc<PartitionTokenTable>> {
        let id = match identity {
            RequestIdentity::Id(id) => *id,
            RequestIdentity::Path(path) => {
                self.index.resolve_path(&collection_path_from_link(path))?
            }
        };
        self.tables.get(&id)
    }

    fn evict_id(&mut self, id: u64) -> bool {
        self.index.evict_by_id(id);
        self.tables.remove(&id).is_some()
    }

    /// Every table belongs to a bound id and the index agrees with itself.
    fn is_consistent(&self) -> bool {
        self.index.is_consistent()
            && self
                .tables
                .keys()
                .all(|id| self.index.resolve_id(*id).is_some())
    }
}

/// One generation of store state.
#[derive(Debug)]
struct StoreState {
    config: SessionStoreConfig,
    format: TokenFormat,
    registry: RwLock<Registry>,
}

impl StoreState {
    fn new(config: SessionStoreConfig) -> Self {
        let format = config.token_format();
        Self {
            config,
            format,
            registry: RwLock::new(Registry::default()),
        }
    }
}

/// Process-local cache of session tokens for one client connection.
///
/// All methods take `&self`; share the store across threads with an `Arc`.
/// Returned tokens and snapshots are copies.
#[derive(Debug)]
pub struct SessionTokenStore {
    state: RwLock<Arc<StoreState>>,
    metrics: SessionStoreMetrics,
}

impl SessionTokenStore {
    /// Create a store from a validated configuration.
    pub fn new(config: SessionStoreConfig) -> TidemarkResult<Self> {
        config.validate()?;
        tracing::debug!(
            host = %config.host,
            protocol_version = %config.protocol_version,
            "Session token store created"
        );
        Ok(Self {
            state: RwLock::new(Arc::new(StoreState::new(config))),
            metrics: SessionStoreMetrics::new(),
        })
    }

    /// Create a store with default settings for `host`.
    pub fn with_host(host: impl Into<String>) -> TidemarkResult<Self> {
        Self::new(SessionStoreConfig::default().with_host(host))
    }

    fn current(&self) -> Arc<StoreState> {
        Arc::clone(&self.state.read())
    }

    /// Host identifier of the current state.
    pub fn host(&self) -> String {
        self.current().config.host.clone()
    }

    /// Header grammar used when encoding tokens.
    pub fn token_format(&self) -> TokenFormat {
        self.current().format
    }

    /// Header value for the collection addressed by `link`.
    ///
    /// Returns an empty string when the collection has no session state yet;
    /// the caller then omits the header.
    pub fn get_token(&self, link: &str) -> String {
        self.resolve_global(&RequestIdentity::path(link))
    }

    /// Header value for a collection the request has already identified.
    pub fn resolve_global(&self, identity: &RequestIdentity) -> String {
        let state = self.current();
        let registry = state.registry.read();
        let encoded = registry
            .table_for(identity)
            .map(|table| state.format.encode(&table.tokens()))
            .unwrap_or_default();
        self.metrics.record_resolve(!encoded.is_empty());
        encoded
    }

    /// Token for a single partition of a collection, if tracked.
    pub fn resolve_partition_local(
        &self,
        identity: &RequestIdentity,
        partition_id: &str,
    ) -> Option<SessionToken> {
        let state = self.current();
        let registry = state.registry.read();
        let token = registry
            .table_for(identity)
            .and_then(|table| table.get(partition_id));
        self.metrics.record_resolve(token.is_some());
        token
    }

    /// Like [`Self::resolve_partition_local`], but a partition created by a
    /// split that has no token of its own falls back to the merged tokens of
    /// its parent partitions.
    pub fn resolve_partition_local_with_parents(
        &self,
        identity: &RequestIdentity,
        partition_id: &str,
        parent_ids: &[&str],
    ) -> Option<SessionToken> {
        let state = self.current();
        let registry = state.registry.read();
        let token = registry.table_for(identity).and_then(|table| {
            table
                .get(partition_id)
                .or_else(|| table.merged_over(parent_ids.iter().copied()))
        });
        self.metrics.record_resolve(token.is_some());
        token
    }

    /// Merge a response's session-token header into the store.
    ///
    /// A header that fails to decode is dropped whole, logged, and returned as
    /// an error; the cached state is untouched.
    pub fn update(
        &self,
        collection_id: u64,
        collection_path: &str,
        raw_token_header: &str,
    ) -> TidemarkResult<UpdateOutcome> {
        let state = self.current();

        let tokens = match decode_header(raw_token_header) {
            Ok(tokens) => tokens,
            Err(e) => {
                self.metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                if state.config.log_decode_failures {
                    tracing::warn!(
                        collection_id,
                        collection_path,
                        error = %e,
                        "Dropping undecodable session token header"
                    );
                }
                return Err(e.into());
            }
        };
        if tokens.is_empty() {
            return Ok(UpdateOutcome::Skipped);
        }

        let path = collection_path_from_link(collection_path);
        if path.is_empty() {
            tracing::debug!(collection_id, "Skipping session update without a collection path");
            return Ok(UpdateOutcome::Skipped);
        }

        {
            let registry = state.registry.read();
            if registry.index.is_bound(collection_id, &path) {
                if let Some(table) = registry.tables.get(&collection_id) {
                    table.merge(&tokens);
                    self.metrics.fast_path_merges.fetch_add(1, Ordering::Relaxed);
                    self.metrics.updates_applied.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(collection_id, partitions = tokens.len(), "Merged session tokens");
                    return Ok(UpdateOutcome::Merged);
                }
            }
        }

        let mut registry = state.registry.write();
        if registry.index.is_bound(collection_id, &path) {
            // Another update bound this identity while we waited for the lock.
            if let Some(table) = registry.tables.get(&collection_id) {
                table.merge(&tokens);
                self.metrics.updates_applied.fetch_add(1, Ordering::Relaxed);
                return Ok(UpdateOutcome::Merged);
            }
        }
        let bind = registry.index.bind(collection_id, &path);
        for displaced in &bind.displaced_ids {
            registry.tables.remove(displaced);
        }
        registry
            .tables
            .entry(collection_id)
            .or_insert_with(|| Arc::new(PartitionTokenTable::new()))
            .merge(&tokens);
        debug_assert!(registry.is_consistent(), "session registry out of sync");
        drop(registry);

        self.metrics.rebinds.fetch_add(1, Ordering::Relaxed);
        self.metrics.updates_applied.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .evictions
            .fetch_add(bind.displaced_ids.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            collection_id,
            collection_path = %path,
            displaced_ids = ?bind.displaced_ids,
            renamed_from = ?bind.renamed_from,
            "Bound collection identity"
        );

        Ok(UpdateOutcome::Rebound {
            evicted_ids: bind.displaced_ids,
        })
    }

    /// Apply the session-relevant parts of a response.
    ///
    /// Responses without a token header or without an owner id are skipped.
    pub fn update_from_response(&self, response: &ResponseMetadata) -> TidemarkResult<UpdateOutcome> {
        let Some(raw) = response.session_token.as_deref() else {
            return Ok(UpdateOutcome::Skipped);
        };
        let Some(identity) = response.collection_identity() else {
            return Ok(UpdateOutcome::Skipped);
        };
        self.update(identity.id, &identity.path, raw)
    }

    /// Forget the collection addressed by `link`. Returns whether anything was removed.
    pub fn evict_by_path(&self, link: &str) -> bool {
        let path = collection_path_from_link(link);
        let state = self.current();
        let mut registry = state.registry.write();
        let Some(id) = registry.index.evict_by_path(&path) else {
            return false;
        };
        registry.tables.remove(&id);
        debug_assert!(registry.is_consistent(), "session registry out of sync");
        drop(registry);

        self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(collection_id = id, collection_path = %path, "Evicted collection");
        true
    }

    /// Forget the collection with durable id `id`. Returns whether anything was removed.
    pub fn evict_by_id(&self, id: u64) -> bool {
        let state = self.current();
        let mut registry = state.registry.write();
        let removed = registry.evict_id(id);
        debug_assert!(registry.is_consistent(), "session registry out of sync");
        drop(registry);

        if removed {
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(collection_id = id, "Evicted collection");
        }
        removed
    }

    /// Deep copy of the current state.
    ///
    /// Structural changes are excluded for the whole copy, and each table is
    /// copied with no header half-applied.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.current();
        let registry = state.registry.read();
        StoreSnapshot {
            host: state.config.host.clone(),
            bindings: registry
                .index
                .iter()
                .map(|(path, id)| (path.to_string(), id))
                .collect(),
            tables: registry
                .tables
                .iter()
                .map(|(id, table)| (*id, table.consistent_tokens()))
                .collect(),
        }
    }

    /// Replace this store's state with `other`'s current state.
    ///
    /// Both stores share the adopted state afterwards. Concurrent callers see
    /// either the old or the new generation, never a mix.
    pub fn adopt_state(&self, other: &SessionTokenStore) {
        let adopted = other.current();
        let host = adopted.config.host.clone();
        *self.state.write() = adopted;
        tracing::debug!(host = %host, "Adopted session store state");
    }

    /// Activity counters for this store.
    pub fn metrics(&self) -> SessionStoreMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::{ProtocolVersion, TidemarkError, TokenDecodeError};

    fn store() -> SessionTokenStore {
        SessionTokenStore::with_host("client-test").expect("valid config")
    }

    #[test]
    fn test_unknown_collection_resolves_empty() {
        let store = store();
        assert_eq!(store.get_token("dbs/d/colls/c"), "");
        assert_eq!(store.resolve_global(&RequestIdentity::Id(1)), "");
        assert_eq!(
            store.resolve_partition_local(&RequestIdentity::Id(1), "P1"),
            None
        );
        assert_eq!(store.metrics().resolve_misses, 3);
    }

    #[test]
    fn test_update_then_get_token() {
        let store = store();
        let outcome = store
            .update(100, "dbs/d/colls/c", "P2:3,P1:5")
            .expect("update");
        assert_eq!(outcome, UpdateOutcome::Rebound { evicted_ids: vec![] });
        assert_eq!(store.get_token("dbs/d/colls/c/docs/x"), "P1:5,P2:3");
        assert_eq!(store.resolve_global(&RequestIdentity::Id(100)), "P1:5,P2:3");
        assert_eq!(
            store.resolve_global(&RequestIdentity::path("/dbs/d/colls/c/")),
            "P1:5,P2:3"
        );
    }

    #[test]
    fn test_second_update_takes_fast_path() {
        let store = store();
        store.update(100, "A", "P1:5").expect("update");
        let outcome = store.update(100, "A", "P1:7").expect("update");
        assert_eq!(outcome, UpdateOutcome::Merged);
        assert_eq!(store.get_token("A"), "P1:7");

        let metrics = store.metrics();
        assert_eq!(metrics.fast_path_merges, 1);
        assert_eq!(metrics.rebinds, 1);
        assert_eq!(metrics.updates_applied, 2);
    }

    #[test]
    fn test_update_is_idempotent() {
        let store = store();
        store.update(100, "A", "P1:5,P2:3").expect("update");
        let once = store.snapshot();
        store.update(100, "A", "P1:5,P2:3").expect("update");
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn test_updates_are_order_independent() {
        let forward = store();
        forward.update(1, "A", "P1:5,P2:3").expect("update");
        forward.update(1, "A", "P1:3,P2:7").expect("update");

        let reverse = store();
        reverse.update(1, "A", "P1:3,P2:7").expect("update");
        reverse.update(1, "A", "P1:5,P2:3").expect("update");

        assert_eq!(forward.get_token("A"), "P1:5,P2:7");
        assert_eq!(forward.snapshot(), reverse.snapshot());
    }

    #[test]
    fn test_recreated_collection_drops_old_state() {
        let store = store();
        store.update(100, "A", "P1:5").expect("update");
        let outcome = store.update(200, "A", "P1:1").expect("update");
        assert_eq!(outcome, UpdateOutcome::Rebound { evicted_ids: vec![100] });
        assert_eq!(store.get_token("A"), "P1:1");
        assert_eq!(store.resolve_global(&RequestIdentity::Id(100)), "");
        assert_eq!(store.metrics().evictions, 1);
    }

    #[test]
    fn test_renamed_collection_keeps_tokens() {
        let store = store();
        store.update(100, "A", "P1:5").expect("update");
        store.update(100, "B", "P2:2").expect("update");
        assert_eq!(store.get_token("A"), "");
        assert_eq!(store.get_token("B"), "P1:5,P2:2");
    }

    #[test]
    fn test_decode_failure_keeps_prior_state() {
        let store = store();
        store.update(100, "A", "P1:5").expect("update");
        let err = store.update(100, "A", "P1:9,P2:garbage").expect_err("bad header");
        assert!(matches!(
            err,
            TidemarkError::Decode(TokenDecodeError::InvalidNumber { .. })
        ));
        assert_eq!(store.get_token("A"), "P1:5");
        assert_eq!(store.metrics().decode_failures, 1);
    }

    #[test]
    fn test_decode_failure_does_not_bind() {
        let store = store();
        assert!(store.update(100, "A", "nope").is_err());
        assert!(store.snapshot().bindings.is_empty());
    }

    #[test]
    fn test_empty_header_is_skipped() {
        let store = store();
        assert_eq!(store.update(100, "A", "").expect("update"), UpdateOutcome::Skipped);
        assert_eq!(store.get_token("A"), "");
        assert_eq!(store.snapshot().collection_count(), 0);
    }

    #[test]
    fn test_empty_collection_path_is_never_bound() {
        let store = store();
        for link in ["", "/", "//"] {
            assert_eq!(
                store.update(7, link, "P1:5").expect("update"),
                UpdateOutcome::Skipped
            );
        }

        let response = ResponseMetadata::new("/")
            .with_owner_id(7)
            .with_session_token("P1:5");
        assert_eq!(
            store.update_from_response(&response).expect("update"),
            UpdateOutcome::Skipped
        );

        assert_eq!(store.get_token(""), "");
        assert_eq!(store.get_token("//"), "");
        assert_eq!(store.resolve_global(&RequestIdentity::Id(7)), "");
        assert!(store.snapshot().bindings.is_empty());
    }

    #[test]
    fn test_legacy_header_and_format() {
        let store = SessionTokenStore::new(
            SessionStoreConfig::default()
                .with_host("legacy")
                .with_protocol_version(ProtocolVersion::LEGACY_FORMAT_CUTOVER),
        )
        .expect("valid config");
        assert_eq!(store.token_format(), TokenFormat::Legacy);
        store.update(1, "A", "42").expect("update");
        assert_eq!(store.get_token("A"), "42");
        assert_eq!(
            store.resolve_partition_local(&RequestIdentity::Id(1), "0"),
            Some(SessionToken::simple(42))
        );
    }

    #[test]
    fn test_resolve_partition_local() {
        let store = store();
        store.update(1, "A", "P1:5,P2:1#9#1=3").expect("update");
        assert_eq!(
            store.resolve_partition_local(&RequestIdentity::from("A"), "P1"),
            Some(SessionToken::simple(5))
        );
        assert_eq!(
            store.resolve_partition_local(&RequestIdentity::Id(1), "P2"),
            Some(SessionToken::vector(1, 9, [(1, 3)]))
        );
        assert_eq!(store.resolve_partition_local(&RequestIdentity::Id(1), "P3"), None);
    }

    #[test]
    fn test_resolve_partition_local_falls_back_to_parents() {
        let store = store();
        store.update(1, "A", "P1:5,P2:8").expect("update");
        let identity = RequestIdentity::Id(1);
        assert_eq!(
            store.resolve_partition_local_with_parents(&identity, "P3", &["P1", "P2"]),
            Some(SessionToken::simple(8))
        );
        assert_eq!(
            store.resolve_partition_local_with_parents(&identity, "P1", &["P2"]),
            Some(SessionToken::simple(5))
        );
        assert_eq!(
            store.resolve_partition_local_with_parents(&identity, "P3", &["P9"]),
            None
        );
    }

    #[test]
    fn test_evict_by_path_and_id() {
        let store = store();
        store.update(1, "A", "P1:5").expect("update");
        store.update(2, "B", "P1:6").expect("update");

        assert!(store.evict_by_path("A"));
        assert!(!store.evict_by_path("A"));
        assert_eq!(store.get_token("A"), "");

        assert!(store.evict_by_id(2));
        assert!(!store.evict_by_id(2));
        assert_eq!(store.get_token("B"), "");
        assert_eq!(store.snapshot().collection_count(), 0);
    }

    #[test]
    fn test_update_from_response() {
        let store = store();
        let response = ResponseMetadata::new("dbs/d/colls/c/docs/1")
            .with_owner_id(7)
            .with_session_token("P1:4");
        assert!(matches!(
            store.update_from_response(&response),
            Ok(UpdateOutcome::Rebound { .. })
        ));
        assert_eq!(store.get_token("dbs/d/colls/c"), "P1:4");

        let no_owner = ResponseMetadata::new("dbs/d/colls/c").with_session_token("P1:9");
        assert_eq!(
            store.update_from_response(&no_owner).expect("update"),
            UpdateOutcome::Skipped
        );
        let no_token = ResponseMetadata::new("dbs/d/colls/c").with_owner_id(7);
        assert_eq!(
            store.update_from_response(&no_token).expect("update"),
            UpdateOutcome::Skipped
        );
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let store = store();
        store.update(1, "A", "P1:5").expect("update");
        let before = store.snapshot();
        store.update(1, "A", "P1:9").expect("update");
        assert_eq!(before.encode_for_path("A", TokenFormat::Partitioned), "P1:5");
        assert_ne!(before, store.snapshot());
        assert_eq!(before.host, "client-test");
    }

    #[test]
    fn test_adopt_state() {
        let a = store();
        let b = SessionTokenStore::with_host("client-other").expect("valid config");
        a.update(1, "A", "P1:5").expect("update");
        b.update(2, "B", "P1:6").expect("update");

        a.adopt_state(&b);
        assert_eq!(a.host(), "client-other");
        assert_eq!(a.get_token("A"), "");
        assert_eq!(a.get_token("B"), "P1:6");
        assert_eq!(a.snapshot(), b.snapshot());

        a.update(2, "B", "P1:8").expect("update");
        assert_eq!(b.get_token("B"), "P1:8");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(SessionTokenStore::with_host("").is_err());
    }
}
