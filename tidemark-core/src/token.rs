//! Session token progress markers and their join.
//!
//! A token is either a bare log sequence number (`"42"`) or a vector token
//! `version#globalLsn[#region=localLsn...]`. The bare form is the vector form
//! with version 0 and no regions, so both share one representation and one
//! merge.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TokenDecodeError;

/// Separator between the parts of a vector token.
pub const VECTOR_PART_SEPARATOR: char = '#';

/// Separator between a region id and its local LSN.
pub const REGION_LSN_SEPARATOR: char = '=';

/// Per-partition session progress marker.
///
/// Tokens form a join semilattice under [`SessionToken::merge`]: merging is
/// commutative, associative and idempotent, and the result dominates both
/// inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken {
    version: u64,
    global_lsn: i64,
    region_lsns: BTreeMap<u32, i64>,
}

impl SessionToken {
    /// Create a bare LSN token.
    pub fn simple(lsn: i64) -> Self {
        Self {
            version: 0,
            global_lsn: lsn,
            region_lsns: BTreeMap::new(),
        }
    }

    /// Create a vector token. Duplicate regions keep their highest LSN.
    pub fn vector(
        version: u64,
        global_lsn: i64,
        regions: impl IntoIterator<Item = (u32, i64)>,
    ) -> Self {
        let mut region_lsns = BTreeMap::new();
        for (region, lsn) in regions {
            raise(&mut region_lsns, region, lsn);
        }
        Self {
            version,
            global_lsn,
            region_lsns,
        }
    }

    /// Topology version this token was issued under.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Global log sequence number.
    pub fn global_lsn(&self) -> i64 {
        self.global_lsn
    }

    /// Local LSN for one region, if tracked.
    pub fn region_lsn(&self, region: u32) -> Option<i64> {
        self.region_lsns.get(&region).copied()
    }

    /// Iterate tracked regions in ascending region order.
    pub fn regions(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.region_lsns.iter().map(|(r, l)| (*r, *l))
    }

    /// Whether this token encodes as a bare LSN.
    pub fn is_simple(&self) -> bool {
        self.version == 0 && self.region_lsns.is_empty()
    }

    /// Join two tokens into one that dominates both.
    pub fn merge(&self, other: &SessionToken) -> SessionToken {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    /// In-place join.
    ///
    /// The global LSN takes the max. Region progress is only comparable within
    /// one topology version: a higher version replaces the region map, an equal
    /// version takes the per-region max.
    pub fn merge_in(&mut self, other: &SessionToken) {
        self.global_lsn = self.global_lsn.max(other.global_lsn);
        match self.version.cmp(&other.version) {
            Ordering::Less => {
                self.version = other.version;
                self.region_lsns = other.region_lsns.clone();
            }
            Ordering::Equal => {
                for (region, lsn) in &other.region_lsns {
                    raise(&mut self.region_lsns, *region, *lsn);
                }
            }
            Ordering::Greater => {}
        }
    }

    /// True when `self.merge(other) == *self`.
    pub fn dominates(&self, other: &SessionToken) -> bool {
        if self.global_lsn < other.global_lsn {
            return false;
        }
        match self.version.cmp(&other.version) {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => other
                .region_lsns
                .iter()
                .all(|(region, lsn)| self.region_lsns.get(region).is_some_and(|own| own >= lsn)),
        }
    }
}

fn raise(regions: &mut BTreeMap<u32, i64>, region: u32, lsn: i64) {
    regions
        .entry(region)
        .and_modify(|current| *current = (*current).max(lsn))
        .or_insert(lsn);
}

fn parse_number<T>(segment: &str) -> Result<T, TokenDecodeError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    segment
        .parse::<T>()
        .map_err(|e| TokenDecodeError::InvalidNumber {
            segment: segment.to_string(),
            reason: e.to_string(),
        })
}

impl FromStr for SessionToken {
    type Err = TokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(TokenDecodeError::Empty);
        }

        if !value.contains(VECTOR_PART_SEPARATOR) {
            return Ok(Self::simple(parse_number::<i64>(value)?));
        }

        let mut parts = value.split(VECTOR_PART_SEPARATOR);
        let version = match parts.next() {
            Some(v) if !v.is_empty() => parse_number::<u64>(v)?,
            _ => {
                return Err(TokenDecodeError::MalformedVector {
                    value: value.to_string(),
                    reason: "missing version".to_string(),
                })
            }
        };
        let global_lsn = match parts.next() {
            Some(g) if !g.is_empty() => parse_number::<i64>(g)?,
            _ => {
                return Err(TokenDecodeError::MalformedVector {
                    value: value.to_string(),
                    reason: "missing global LSN".to_string(),
                })
            }
        };

        let mut regions = Vec::new();
        for pair in parts {
            let (region, lsn) = pair
                .split_once(REGION_LSN_SEPARATOR)
                .ok_or_else(|| TokenDecodeError::MalformedRegion {
                    pair: pair.to_string(),
                })?;
            let region = region
                .parse::<u32>()
                .map_err(|_| TokenDecodeError::MalformedRegion {
                    pair: pair.to_string(),
                })?;
            let lsn = lsn
                .parse::<i64>()
                .map_err(|_| TokenDecodeError::MalformedRegion {
                    pair: pair.to_string(),
                })?;
            regions.push((region, lsn));
        }

        Ok(Self::vector(version, global_lsn, regions))
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_simple() {
            return write!(f, "{}", self.global_lsn);
        }
        write!(
            f,
            "{}{}{}",
            self.version, VECTOR_PART_SEPARATOR, self.global_lsn
        )?;
        for (region, lsn) in &self.region_lsns {
            write!(
                f,
                "{}{}{}{}",
                VECTOR_PART_SEPARATOR, region, REGION_LSN_SEPARATOR, lsn
            )?;
        }
        Ok(())
    }
}

impl TryFrom<String> for SessionToken {
    type Error = TokenDecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
