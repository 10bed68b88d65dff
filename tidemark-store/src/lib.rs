//! Tidemark Store - Session Token Cache
//!
//! Client-side, in-memory cache of the session tokens returned by a
//! partitioned backend, so that a client can read its own writes. The store
//! performs no I/O: the transport layer feeds it response headers and asks it
//! for the header to attach to the next request.

pub mod index;
pub mod metrics;
pub mod snapshot;
pub mod store;
pub mod table;

pub use index::{BindOutcome, CollectionIdentityIndex};
pub use metrics::{SessionStoreMetrics, SessionStoreMetricsSnapshot};
pub use snapshot::StoreSnapshot;
pub use store::{SessionTokenStore, UpdateOutcome};
pub use table::PartitionTokenTable;

pub use tidemark_core::{
    CollectionIdentity, PartitionTokens, ProtocolVersion, RequestIdentity, ResponseMetadata,
    SessionStoreConfig, SessionToken, TidemarkError, TidemarkResult, TokenDecodeError,
    TokenFormat,
};
