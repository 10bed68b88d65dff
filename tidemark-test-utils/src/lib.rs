//! Tidemark Test Utilities
//!
//! Shared test infrastructure for the Tidemark workspace:
//! - Proptest generators for tokens, token sets and header values
//! - Fixtures for common store configurations
//! - Custom assertions over token sets
//! - Tracing setup for tests

pub use tidemark_core::{
    decode_header, encode_header, PartitionTokens, ProtocolVersion, SessionStoreConfig,
    SessionToken, TokenFormat,
};

use proptest::prelude::*;
use std::sync::Once;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-friendly subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn` so dropped headers show up.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Config for a store speaking the partitioned header format.
pub fn test_config(host: &str) -> SessionStoreConfig {
    SessionStoreConfig::default()
        .with_host(host)
        .with_protocol_version(ProtocolVersion::CURRENT)
}

/// Config for a store speaking the legacy single-token format.
pub fn legacy_test_config(host: &str) -> SessionStoreConfig {
    test_config(host).with_protocol_version(ProtocolVersion::LEGACY_FORMAT_CUTOVER)
}

/// Decode a header that the test knows to be valid.
pub fn tokens(raw: &str) -> PartitionTokens {
    match decode_header(raw) {
        Ok(tokens) => tokens,
        Err(err) => panic!("test header {raw:?} should decode: {err}"),
    }
}

/// Sequential reference result: merge every header in order into one set.
pub fn merge_headers<'a, I>(headers: I) -> PartitionTokens
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = PartitionTokens::new();
    for raw in headers {
        merged.merge_all(&tokens(raw));
    }
    merged
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert that `newer` tracks every partition of `older` with a dominating token.
pub fn assert_dominates(newer: &PartitionTokens, older: &PartitionTokens) {
    assert!(
        newer.dominates(older),
        "expected {:?} to dominate {:?}",
        encode_header(newer, TokenFormat::Partitioned),
        encode_header(older, TokenFormat::Partitioned)
    );
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Partition ids as they appear on the wire.
pub fn arb_partition_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,6}"
}

/// Simple and vector session tokens.
pub fn arb_session_token() -> impl Strategy<Value = SessionToken> {
    prop_oneof![
        (-1i64..100_000).prop_map(SessionToken::simple),
        (
            1u64..4,
            0i64..100_000,
            prop::collection::vec((0u32..4, 0i64..1_000), 0..4)
        )
            .prop_map(|(version, global, regions)| SessionToken::vector(version, global, regions)),
    ]
}

/// Token sets with up to `max_partitions` entries.
pub fn arb_partition_tokens(max_partitions: usize) -> impl Strategy<Value = PartitionTokens> {
    prop::collection::btree_map(arb_partition_id(), arb_session_token(), 0..=max_partitions)
        .prop_map(|map| map.into_iter().collect())
}

/// Non-empty partitioned header values.
pub fn arb_header() -> impl Strategy<Value = String> {
    arb_partition_tokens(5)
        .prop_filter("header must carry a partition", |t| !t.is_empty())
        .prop_map(|t| encode_header(&t, TokenFormat::Partitioned))
}
