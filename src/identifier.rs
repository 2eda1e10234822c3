//! Stream identifier parsing and construction
//!
//! Stream ids are slash-delimited: `SOURCE/SOURCE_ID/TYPE/CONTENT_ID`.
//!
//! - user streams: `user/<user id>/category/gaming`, `user/<user id>/tag/recipes`
//!   (the content id may itself contain slashes)
//! - enterprise streams: `enterprise/<team>/tag/<uuid>`

use std::fmt;
use std::str::FromStr;

/// Source segment of user streams
pub const STREAM_SOURCE_USER: &str = "user";
/// Source segment of enterprise (team) streams
pub const STREAM_SOURCE_ENTERPRISE: &str = "enterprise";
/// Placeholder used for every part of an unrecognized stream id
pub const STREAM_SOURCE_UNKNOWN: &str = "unknown";

/// Stream type segment for categories (feeds)
pub const STREAM_TYPE_CATEGORY: &str = "category";
/// Stream type segment for tags (boards)
pub const STREAM_TYPE_TAG: &str = "tag";

/// Content id of the aggregate "all categories" stream
pub const GLOBAL_ALL: &str = "global.all";

/// Owner of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    /// Personal stream owned by a user
    User,
    /// Team stream owned by an enterprise
    Enterprise,
    /// Anything else (feeds, system streams)
    Unknown,
}

impl StreamSource {
    /// Id segment for this source
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamSource::User => STREAM_SOURCE_USER,
            StreamSource::Enterprise => STREAM_SOURCE_ENTERPRISE,
            StreamSource::Unknown => STREAM_SOURCE_UNKNOWN,
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable stream identifier
///
/// # Examples
///
/// ```
/// use feedly_client::identifier::{StreamId, StreamSource};
///
/// let id = StreamId::parse("user/abcd/tag/recipes/desserts").unwrap();
/// assert_eq!(id.source(), StreamSource::User);
/// assert_eq!(id.source_id(), "abcd");
/// assert!(id.is_tag());
/// assert_eq!(id.content_id(), "recipes/desserts");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId {
    id: String,
    source: StreamSource,
    source_id: String,
    stream_type: String,
    content_id: String,
}

impl StreamId {
    /// Parse a full stream id string
    ///
    /// # Errors
    ///
    /// Returns an error if the id has fewer than four slash-separated parts.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() < 4 {
            return Err(IdentifierError::InvalidFormat(format!(
                "invalid stream id {s}: expected SOURCE/SOURCE_ID/TYPE/CONTENT_ID"
            )));
        }

        let (source, content_id) = if s.starts_with(STREAM_SOURCE_USER) {
            (StreamSource::User, parts[3..].join("/"))
        } else if s.starts_with(STREAM_SOURCE_ENTERPRISE) {
            (StreamSource::Enterprise, parts[3].to_string())
        } else {
            return Ok(Self {
                id: s.to_string(),
                source: StreamSource::Unknown,
                source_id: STREAM_SOURCE_UNKNOWN.to_string(),
                stream_type: STREAM_SOURCE_UNKNOWN.to_string(),
                content_id: STREAM_SOURCE_UNKNOWN.to_string(),
            });
        };

        Ok(Self {
            id: s.to_string(),
            source,
            source_id: parts[1].to_string(),
            stream_type: parts[2].to_string(),
            content_id,
        })
    }

    /// Build a stream id from its parts
    ///
    /// # Errors
    ///
    /// Unknown sources cannot be joined, and no part may be empty. The source id
    /// and type may not contain `/`, nor may the content id of an enterprise
    /// stream, so the built id always parses back to the same parts.
    pub fn from_parts(
        source: StreamSource,
        source_id: &str,
        stream_type: &str,
        content_id: &str,
    ) -> Result<Self, IdentifierError> {
        if source == StreamSource::Unknown {
            return Err(IdentifierError::InvalidFormat(
                "cannot build a stream id for an unknown source".to_string(),
            ));
        }
        for (name, value) in [
            ("source id", source_id),
            ("stream type", stream_type),
            ("content id", content_id),
        ] {
            if value.is_empty() {
                return Err(IdentifierError::InvalidFormat(format!(
                    "{name} cannot be empty"
                )));
            }
        }
        let mut single_segment = vec![("source id", source_id), ("stream type", stream_type)];
        if source == StreamSource::Enterprise {
            single_segment.push(("content id", content_id));
        }
        for (name, value) in single_segment {
            if value.contains('/') {
                return Err(IdentifierError::InvalidFormat(format!(
                    "{name} {value} cannot contain '/'"
                )));
            }
        }

        Ok(Self {
            id: format!("{}/{source_id}/{stream_type}/{content_id}", source.as_str()),
            source,
            source_id: source_id.to_string(),
            stream_type: stream_type.to_string(),
            content_id: content_id.to_string(),
        })
    }

    /// Aggregate stream of every personal category of a user
    pub fn all_user_categories(user_id: &str) -> Result<Self, IdentifierError> {
        Self::from_parts(StreamSource::User, user_id, STREAM_TYPE_CATEGORY, GLOBAL_ALL)
    }

    /// Aggregate stream of every team category of an enterprise
    pub fn all_enterprise_categories(enterprise_name: &str) -> Result<Self, IdentifierError> {
        Self::from_parts(
            StreamSource::Enterprise,
            enterprise_name,
            STREAM_TYPE_CATEGORY,
            GLOBAL_ALL,
        )
    }

    /// Full slash-joined id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stream owner
    pub fn source(&self) -> StreamSource {
        self.source
    }

    /// Id of the owner (user id or enterprise name)
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Type segment, typically `category` or `tag`
    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    /// Content segment: a label for user streams, a UUID for enterprise streams
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Namespace prefix shared by every stream of the same owner and type
    pub fn namespace(&self) -> String {
        format!("{}/{}/{}/", self.source.as_str(), self.source_id, self.stream_type)
    }

    /// Whether this is a personal stream
    pub fn is_user_stream(&self) -> bool {
        self.source == StreamSource::User
    }

    /// Whether this is a team stream
    pub fn is_enterprise_stream(&self) -> bool {
        self.source == StreamSource::Enterprise
    }

    /// Whether this stream is a category
    pub fn is_category(&self) -> bool {
        self.stream_type == STREAM_TYPE_CATEGORY
    }

    /// Whether this stream is a tag
    pub fn is_tag(&self) -> bool {
        self.stream_type == STREAM_TYPE_TAG
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for StreamId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors that can occur during stream id parsing
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// Invalid stream id format
    #[error("identifier error: {0}")]
    InvalidFormat(String),
}
