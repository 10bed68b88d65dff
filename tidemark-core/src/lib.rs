//! Tidemark Core - Session Token Types
//!
//! Data types shared by the session token store: the token itself and its
//! join, the session-token header codec, collection identity helpers, errors
//! and configuration. Nothing here holds shared state.

pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod partition;
pub mod token;

pub use codec::{
    decode_header, encode_header, ProtocolVersion, TokenFormat, PARTITION_SEPARATOR,
    PARTITION_TOKEN_DELIMITER,
};
pub use config::SessionStoreConfig;
pub use error::{ConfigError, TidemarkError, TidemarkResult, TokenDecodeError};
pub use identity::{
    collection_path_from_link, CollectionIdentity, RequestIdentity, ResponseMetadata,
    ALT_CONTENT_PATH_HEADER, OWNER_ID_HEADER, SESSION_TOKEN_HEADER,
};
pub use partition::{PartitionTokens, DEFAULT_PARTITION_ID};
pub use token::SessionToken;
