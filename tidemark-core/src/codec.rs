//! Session-token header codec.
//!
//! Two wire grammars exist. Before partitioning, the header carries one token
//! for the whole collection. After partitioning, it carries a list of
//! `partitionId:token` pairs joined by `,`. The grammar is chosen once per
//! negotiated [`ProtocolVersion`] via [`TokenFormat`], not per call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TokenDecodeError;
use crate::partition::{PartitionTokens, DEFAULT_PARTITION_ID};
use crate::token::SessionToken;

/// Separator between partition entries in the partitioned format.
pub const PARTITION_SEPARATOR: char = ',';

/// Separator between a partition id and its token.
pub const PARTITION_TOKEN_DELIMITER: char = ':';

/// Negotiated wire protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub u32);

impl ProtocolVersion {
    /// Last version that speaks the single-token legacy format.
    pub const LEGACY_FORMAT_CUTOVER: ProtocolVersion = ProtocolVersion(1);

    /// Version negotiated by default.
    pub const CURRENT: ProtocolVersion = ProtocolVersion(2);

    /// Header grammar spoken at this version.
    pub fn token_format(self) -> TokenFormat {
        TokenFormat::for_protocol(self)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session-token header grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenFormat {
    /// One token, implicitly for partition `"0"`.
    Legacy,
    /// `partitionId:token[,partitionId:token...]`
    Partitioned,
}

impl TokenFormat {
    pub fn for_protocol(version: ProtocolVersion) -> Self {
        if version <= ProtocolVersion::LEGACY_FORMAT_CUTOVER {
            TokenFormat::Legacy
        } else {
            TokenFormat::Partitioned
        }
    }

    /// Encode a token set as a header value in this grammar.
    pub fn encode(self, tokens: &PartitionTokens) -> String {
        encode_header(tokens, self)
    }

    /// Decode a header value.
    ///
    /// Both grammars read the same way: the reader is tolerant and accepts
    /// either shape regardless of the negotiated version.
    pub fn decode(self, raw: &str) -> Result<PartitionTokens, TokenDecodeError> {
        decode_header(raw)
    }
}

/// Decode a raw session-token header value.
///
/// An empty or whitespace-only value decodes to an empty set. A value without
/// any `:` is a legacy single token for partition `"0"`. Any malformed segment
/// fails the whole header.
pub fn decode_header(raw: &str) -> Result<PartitionTokens, TokenDecodeError> {
    let raw = raw.trim();
    let mut tokens = PartitionTokens::new();
    if raw.is_empty() {
        return Ok(tokens);
    }

    if !raw.contains(PARTITION_TOKEN_DELIMITER) {
        tokens.merge_token(DEFAULT_PARTITION_ID, raw.parse::<SessionToken>()?);
        return Ok(tokens);
    }

    for segment in raw.split(PARTITION_SEPARATOR) {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(TokenDecodeError::Empty);
        }
        let (partition_id, token) = segment
            .split_once(PARTITION_TOKEN_DELIMITER)
            .ok_or_else(|| TokenDecodeError::MissingPartitionId {
                segment: segment.to_string(),
            })?;
        let partition_id = partition_id.trim();
        if partition_id.is_empty() {
            return Err(TokenDecodeError::MissingPartitionId {
                segment: segment.to_string(),
            });
        }
        let token = token
            .parse::<SessionToken>()
            .map_err(|e| match e {
                TokenDecodeError::Empty => TokenDecodeError::InvalidNumber {
                    segment: segment.to_string(),
                    reason: "missing token".to_string(),
                },
                other => other,
            })?;
        tokens.merge_token(partition_id, token);
    }

    Ok(tokens)
}

/// Encode a token set as a header value.
///
/// The partitioned grammar emits entries sorted by partition id. The legacy
/// grammar emits only the default partition's token, or an empty string when
/// that partition is not tracked.
pub fn encode_header(tokens: &PartitionTokens, format: TokenFormat) -> String {
    match format {
        TokenFormat::Legacy => tokens
            .get(DEFAULT_PARTITION_ID)
            .map(ToString::to_string)
            .unwrap_or_default(),
        TokenFormat::Partitioned => tokens
            .iter()
            .map(|(pid, token)| format!("{}{}{}", pid, PARTITION_TOKEN_DELIMITER, token))
            .collect::<Vec<_>>()
            .join(","),
    }
}

// ============================================================================
// TESTS
// ============================================================================
