//! Entries, categories and tags
//!
//! Every entity wraps the [`Document`] the API returned plus a handle on the
//! session it came from. Categories and tags also carry their parsed
//! [`StreamId`] and implement [`Streamable`].

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::data::document::Document;
use crate::identifier::{
    IdentifierError, StreamId, StreamSource, STREAM_TYPE_CATEGORY, STREAM_TYPE_TAG,
};
use crate::registry::RegistryEntity;
use crate::session::{quote_plus, ApiResult, SharedSession};
use crate::stream::{ContentStream, IdStream, StreamCursor, StreamOptions};

/// Entries are tagged and untagged in batches of this size (URL length limit)
pub const TAG_BATCH_SIZE: usize = 50;

/// Statuses ignored by [`TagOps::tag_entries`] unless told otherwise
///
/// 409 is returned when an entry already carries the tag.
pub const DEFAULT_IGNORED_STATUSES: &[u16] = &[409];

/// Anything backed by a stream
pub trait Streamable {
    /// Session used for requests
    fn session(&self) -> &SharedSession;

    /// Stream identifier
    fn stream_id(&self) -> &StreamId;

    /// Full stream id string
    fn id(&self) -> &str {
        self.stream_id().id()
    }

    /// Cursor over the stream's entries
    fn stream_contents(&self, options: StreamOptions) -> ContentStream {
        StreamCursor::new(self.session().clone(), self.stream_id().clone(), options)
    }

    /// Cursor over the stream's entry ids
    fn stream_ids(&self, options: StreamOptions) -> IdStream {
        StreamCursor::new(self.session().clone(), self.stream_id().clone(), options)
    }
}

/// One article
#[derive(Debug, Clone)]
pub struct Entry {
    doc: Document,
    session: SharedSession,
}

impl Entry {
    /// Wrap a document
    pub fn new(doc: Document, session: SharedSession) -> Self {
        Self { doc, session }
    }

    /// Wrap a JSON object
    pub fn from_value(value: Value, session: SharedSession) -> ApiResult<Self> {
        Ok(Self::new(Document::from_value(value)?, session))
    }

    /// Entry id
    pub fn id(&self) -> Option<&str> {
        self.doc.id()
    }

    /// Title
    pub fn title(&self) -> Option<&str> {
        self.doc.get_str("title")
    }

    /// Annotations (highlights and comments)
    pub fn annotations(&self) -> &[Value] {
        self.doc.get_array("annotations")
    }

    /// Tags applied to the entry
    pub fn tags(&self) -> &[Value] {
        self.doc.get_array("tags")
    }

    /// Raw field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Underlying document
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Session the entry came from
    pub fn session(&self) -> &SharedSession {
        &self.session
    }
}

macro_rules! stream_entity {
    (
        $(#[$meta:meta])*
        $name:ident, $source:expr, $stream_type:expr, $list_endpoint:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            doc: Document,
            stream_id: StreamId,
            session: SharedSession,
        }

        impl $name {
            /// Wrap a document returned by a list endpoint
            ///
            /// # Errors
            /// The document must carry an `id` of the matching source and type.
            pub fn from_document(
                doc: Document,
                session: SharedSession,
            ) -> Result<Self, IdentifierError> {
                let id = doc.id().ok_or_else(|| {
                    IdentifierError::InvalidFormat("stream document has no id".to_string())
                })?;
                let stream_id = StreamId::parse(id)?;
                if stream_id.source() != $source || stream_id.stream_type() != $stream_type {
                    return Err(IdentifierError::InvalidFormat(format!(
                        "{id} is not a {} {} stream",
                        $source, $stream_type
                    )));
                }
                Ok(Self {
                    doc,
                    stream_id,
                    session,
                })
            }

            /// Placeholder known only by its id
            pub fn from_stream_id(stream_id: StreamId, session: SharedSession) -> Self {
                Self {
                    doc: Document::with_id(stream_id.id()),
                    stream_id,
                    session,
                }
            }

            /// Display label, the content id when the document has none
            pub fn label(&self) -> &str {
                self.doc
                    .get_str("label")
                    .unwrap_or_else(|| self.stream_id.content_id())
            }

            /// Raw field
            pub fn get(&self, key: &str) -> Option<&Value> {
                self.doc.get(key)
            }

            /// Underlying document
            pub fn doc(&self) -> &Document {
                &self.doc
            }
        }

        impl Streamable for $name {
            fn session(&self) -> &SharedSession {
                &self.session
            }

            fn stream_id(&self) -> &StreamId {
                &self.stream_id
            }
        }

        impl RegistryEntity for $name {
            const SOURCE: StreamSource = $source;
            const STREAM_TYPE: &'static str = $stream_type;
            const LIST_ENDPOINT: &'static str = $list_endpoint;

            fn from_document(
                doc: Document,
                session: SharedSession,
            ) -> Result<Self, IdentifierError> {
                $name::from_document(doc, session)
            }

            fn from_stream_id(stream_id: StreamId, session: SharedSession) -> Self {
                $name::from_stream_id(stream_id, session)
            }

            fn label(&self) -> &str {
                $name::label(self)
            }
        }
    };
}

stream_entity!(
    /// Personal category (`user/<id>/category/<name>`)
    UserCategory,
    StreamSource::User,
    STREAM_TYPE_CATEGORY,
    "/v3/categories"
);

stream_entity!(
    /// Personal tag, a.k.a. board (`user/<id>/tag/<name>`)
    UserTag,
    StreamSource::User,
    STREAM_TYPE_TAG,
    "/v3/tags"
);

stream_entity!(
    /// Team category, a.k.a. feed (`enterprise/<name>/category/<uuid>`)
    EnterpriseCategory,
    StreamSource::Enterprise,
    STREAM_TYPE_CATEGORY,
    "/v3/enterprise/collections"
);

stream_entity!(
    /// Team tag, a.k.a. team board (`enterprise/<name>/tag/<uuid>`)
    EnterpriseTag,
    StreamSource::Enterprise,
    STREAM_TYPE_TAG,
    "/v3/enterprise/tags"
);

/// `/v3/tags/<tag>/<id1>,<id2>,...`
pub(crate) fn untag_path(tag_id: &str, entry_ids: &[String]) -> String {
    let ids: Vec<String> = entry_ids.iter().map(|id| quote_plus(id)).collect();
    format!("/v3/tags/{}/{}", quote_plus(tag_id), ids.join(","))
}

/// Tagging operations shared by personal and team tags
#[async_trait]
pub trait TagOps: Streamable + Sync {
    /// Tag endpoint of this tag
    fn tag_path(&self) -> String {
        format!("/v3/tags/{}", quote_plus(self.id()))
    }

    /// Tag one entry
    async fn tag_entry(&self, entry_id: &str) -> ApiResult<()> {
        self.session()
            .put(&self.tag_path(), json!({ "entryId": entry_id }))
            .await?;
        Ok(())
    }

    /// Tag entries in batches, skipping batches that fail with an ignored status
    async fn tag_entries(&self, entry_ids: &[String], ignore_statuses: &[u16]) -> ApiResult<()> {
        let path = self.tag_path();
        for batch in entry_ids.chunks(TAG_BATCH_SIZE) {
            match self
                .session()
                .put(&path, json!({ "entryIds": batch }))
                .await
            {
                Ok(_) => debug!(tag = self.id(), count = batch.len(), "Tagged entries"),
                Err(e) if e.status().is_some_and(|s| ignore_statuses.contains(&s)) => {
                    warn!(tag = self.id(), error = %e, "Ignored error while tagging entries");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Remove this tag from every entry the options select
    ///
    /// Not reversible. Returns the number of entries untagged.
    async fn untag_all(&self, options: StreamOptions) -> ApiResult<usize> {
        let entry_ids = self.stream_ids(options).collect_all().await?;
        for batch in entry_ids.chunks(TAG_BATCH_SIZE) {
            self.session().delete(&untag_path(self.id(), batch)).await?;
        }
        debug!(tag = self.id(), count = entry_ids.len(), "Untagged entries");
        Ok(entry_ids.len())
    }
}

impl TagOps for UserTag {}

impl TagOps for EnterpriseTag {}

impl EnterpriseTag {
    /// Archive the tag; it disappears from tag lists but keeps its entries
    pub async fn archive(&self) -> ApiResult<()> {
        let path = format!("/v3/enterprise/tags/{}", quote_plus(self.id()));
        self.session.delete(&path).await?;
        Ok(())
    }

    /// Delete the tag and untag its entries for every team member
    ///
    /// Not reversible.
    pub async fn delete(&self) -> ApiResult<()> {
        let path = format!(
            "/v3/enterprise/tags/{}?deleteContent=true",
            quote_plus(self.id())
        );
        self.session.delete(&path).await?;
        Ok(())
    }
}
