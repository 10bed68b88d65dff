//! Collection identity types and response metadata.

use serde::{Deserialize, Serialize};

/// Header carrying session tokens on requests and responses.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Response header naming the collection a response was served from.
pub const ALT_CONTENT_PATH_HEADER: &str = "x-alt-content-path";

/// Response header carrying the owning collection's durable numeric id.
pub const OWNER_ID_HEADER: &str = "x-owner-id";

const DATABASES_SEGMENT: &str = "dbs";
const COLLECTIONS_SEGMENT: &str = "colls";

/// Durable collection id paired with the logical path it is addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionIdentity {
    pub id: u64,
    pub path: String,
}

impl CollectionIdentity {
    /// Create an identity, normalising `path` with [`collection_path_from_link`].
    pub fn new(id: u64, path: &str) -> Self {
        Self {
            id,
            path: collection_path_from_link(path),
        }
    }
}

/// What an outgoing request already knows about its target collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestIdentity {
    /// Resource-id addressed request.
    Id(u64),
    /// Name addressed request; normalised before lookup.
    Path(String),
}

impl RequestIdentity {
    pub fn path(link: impl AsRef<str>) -> Self {
        RequestIdentity::Path(collection_path_from_link(link.as_ref()))
    }
}

impl From<u64> for RequestIdentity {
    fn from(id: u64) -> Self {
        RequestIdentity::Id(id)
    }
}

impl From<&str> for RequestIdentity {
    fn from(link: &str) -> Self {
        RequestIdentity::path(link)
    }
}

/// Reduce a resource link to the collection path it belongs to.
///
/// Leading and trailing `/` are trimmed. Links of the form
/// `dbs/{db}/colls/{coll}/...` are truncated to `dbs/{db}/colls/{coll}`; any
/// other value is already a collection name and is returned trimmed.
pub fn collection_path_from_link(link: &str) -> String {
    let trimmed = link.trim().trim_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.len() >= 4
        && segments[0] == DATABASES_SEGMENT
        && segments[2] == COLLECTIONS_SEGMENT
    {
        return segments[..4].join("/");
    }
    trimmed.to_string()
}

/// Session-relevant metadata extracted from one backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Link the request was addressed to.
    pub request_link: String,
    /// Collection path reported by the backend, if any.
    pub alt_content_path: Option<String>,
    /// Durable id of the owning collection, if reported.
    pub owner_id: Option<u64>,
    /// Raw session-token header value, if present.
    pub session_token: Option<String>,
}

impl ResponseMetadata {
    pub fn new(request_link: impl Into<String>) -> Self {
        Self {
            request_link: request_link.into(),
            ..Default::default()
        }
    }

    /// Build from raw response headers. Header names match case-insensitively;
    /// an unparseable owner id is treated as absent.
    pub fn from_headers<'a, I>(request_link: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut meta = Self::new(request_link);
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(SESSION_TOKEN_HEADER) {
                meta.session_token = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(ALT_CONTENT_PATH_HEADER) {
                meta.alt_content_path = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(OWNER_ID_HEADER) {
                meta.owner_id = value.trim().parse().ok();
            }
        }
        meta
    }

    pub fn with_alt_content_path(mut self, path: impl Into<String>) -> Self {
        self.alt_content_path = Some(path.into());
        self
    }

    pub fn with_owner_id(mut self, id: u64) -> Self {
        self.owner_id = Some(id);
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Identity of the collection that served this response.
    ///
    /// Prefers the alt-content path, falling back to the request link.
    /// `None` when the owner id is unknown or neither names a collection.
    pub fn collection_identity(&self) -> Option<CollectionIdentity> {
        let owner_id = self.owner_id?;
        let path = self
            .alt_content_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.request_link);
        let identity = CollectionIdentity::new(owner_id, path);
        if identity.path.is_empty() {
            return None;
        }
        Some(identity)
    }
}
