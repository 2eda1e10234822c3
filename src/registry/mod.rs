//! Name resolution for categories and tags
//!
//! A [`StreamRegistry`] fetches one list endpoint on first use and indexes
//! the result by content id and by label. Lookups accept a full stream id,
//! a UUID, a content id, or a label, in that order.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::data::Document;
use crate::data::Streamable;
use crate::identifier::{IdentifierError, StreamId, StreamSource};
use crate::session::{ApiError, SharedSession};

/// Errors from name resolution
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Nothing matched the name or id
    #[error("'{name}' not found, available: [{}]", .available.join(", "))]
    NotFound {
        /// Requested name or id
        name: String,
        /// Labels known to the registry, sorted
        available: Vec<String>,
    },

    /// List request failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A stream id could not be built
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// The source id (user id or enterprise name) is unknown
    #[error("cannot resolve '{0}': the {1} source id is unknown")]
    Namespace(String, StreamSource),
}

/// An entity a registry can list and build
pub trait RegistryEntity: Streamable + Clone + Sized {
    /// Source of the streams
    const SOURCE: StreamSource;
    /// `category` or `tag`
    const STREAM_TYPE: &'static str;
    /// Endpoint returning every entity of this kind
    const LIST_ENDPOINT: &'static str;

    /// Build from a listed document
    fn from_document(doc: Document, session: SharedSession) -> Result<Self, IdentifierError>;

    /// Build a placeholder from an id
    fn from_stream_id(stream_id: StreamId, session: SharedSession) -> Self;

    /// Display label
    fn label(&self) -> &str;
}

#[derive(Debug, Clone)]
struct RegistryCache<E> {
    streams: Vec<E>,
    id2stream: HashMap<String, E>,
    name2stream: HashMap<String, E>,
}

impl<E: RegistryEntity> RegistryCache<E> {
    fn build(streams: Vec<E>) -> Self {
        let mut id2stream = HashMap::with_capacity(streams.len());
        let mut name2stream = HashMap::with_capacity(streams.len());

        for stream in &streams {
            id2stream.insert(stream.stream_id().content_id().to_string(), stream.clone());
            if let Some(previous) = name2stream.insert(stream.label().to_string(), stream.clone()) {
                debug!(
                    label = stream.label(),
                    replaced = previous.id(),
                    by = stream.id(),
                    "Duplicate label, keeping the last stream"
                );
            }
        }

        Self {
            streams,
            id2stream,
            name2stream,
        }
    }

    fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.name2stream.keys().cloned().collect();
        labels.sort();
        labels
    }
}

/// Lazily populated lookup of one kind of stream
#[derive(Debug, Clone)]
pub struct StreamRegistry<E> {
    session: SharedSession,
    source_id: Option<String>,
    cache: Option<RegistryCache<E>>,
}

impl<E: RegistryEntity> StreamRegistry<E> {
    /// Empty registry
    ///
    /// `source_id` is the user id for personal streams and the enterprise
    /// name for team streams. When unknown it is learned from the list.
    pub fn new(session: SharedSession, source_id: Option<String>) -> Self {
        Self {
            session,
            source_id,
            cache: None,
        }
    }

    /// Registry seeded with known streams; no list request until `refresh()`
    pub fn with_streams(session: SharedSession, source_id: Option<String>, streams: Vec<E>) -> Self {
        let mut registry = Self::new(session, source_id);
        registry.learn_source_id(&streams);
        registry.cache = Some(RegistryCache::build(streams));
        registry
    }

    /// User id or enterprise name of this registry's streams
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// `<source>/<source_id>/<type>/`, when the source id is known
    pub fn namespace(&self) -> Option<String> {
        self.source_id
            .as_ref()
            .map(|sid| format!("{}/{sid}/{}/", E::SOURCE, E::STREAM_TYPE))
    }

    /// Whether the list has been fetched
    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    /// Forget the cached list; the next lookup fetches it again
    pub fn refresh(&mut self) {
        self.cache = None;
    }

    /// Resolve a full id, UUID, content id or label
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] listing the known labels when nothing matches.
    pub async fn get(&mut self, name_or_id: &str) -> Result<E, RegistryError> {
        if let Some(stream_id) = self.qualified_id(name_or_id) {
            return Ok(self.cached_or_placeholder(stream_id));
        }

        if Uuid::parse_str(name_or_id).is_ok() {
            if self.source_id.is_none() {
                self.load().await?;
            }
            let source_id = self
                .source_id
                .clone()
                .ok_or_else(|| RegistryError::Namespace(name_or_id.to_string(), E::SOURCE))?;
            let stream_id = StreamId::from_parts(E::SOURCE, &source_id, E::STREAM_TYPE, name_or_id)?;
            return Ok(self.cached_or_placeholder(stream_id));
        }

        let cache = self.load().await?;
        if let Some(stream) = cache.id2stream.get(name_or_id) {
            return Ok(stream.clone());
        }
        if let Some(stream) = cache.name2stream.get(name_or_id) {
            return Ok(stream.clone());
        }

        Err(RegistryError::NotFound {
            name: name_or_id.to_string(),
            available: cache.labels(),
        })
    }

    /// Every stream, fetching the list if needed
    pub async fn streams(&mut self) -> Result<&[E], RegistryError> {
        Ok(&self.load().await?.streams)
    }

    /// Streams keyed by content id
    pub async fn id2stream(&mut self) -> Result<&HashMap<String, E>, RegistryError> {
        Ok(&self.load().await?.id2stream)
    }

    /// Streams keyed by label
    pub async fn name2stream(&mut self) -> Result<&HashMap<String, E>, RegistryError> {
        Ok(&self.load().await?.name2stream)
    }

    /// Add a stream to a loaded cache, e.g. one just created
    ///
    /// Does nothing before the first load; the list will include it.
    pub fn insert_cached(&mut self, stream: E) {
        if let Some(cache) = self.cache.take() {
            let mut streams = cache.streams;
            streams.retain(|s| s.id() != stream.id());
            streams.push(stream);
            self.cache = Some(RegistryCache::build(streams));
        }
    }

    fn qualified_id(&self, name_or_id: &str) -> Option<StreamId> {
        let stream_id = StreamId::parse(name_or_id).ok()?;
        let same_kind = stream_id.source() == E::SOURCE && stream_id.stream_type() == E::STREAM_TYPE;
        let same_source = self
            .source_id
            .as_deref()
            .map_or(true, |sid| sid == stream_id.source_id());
        (same_kind && same_source).then_some(stream_id)
    }

    fn cached_or_placeholder(&self, stream_id: StreamId) -> E {
        self.cache
            .as_ref()
            .and_then(|cache| cache.id2stream.get(stream_id.content_id()))
            .cloned()
            .unwrap_or_else(|| {
                debug!(id = stream_id.id(), "Not in cache, using placeholder");
                E::from_stream_id(stream_id, self.session.clone())
            })
    }

    async fn load(&mut self) -> Result<&RegistryCache<E>, RegistryError> {
        let cache = match self.cache.take() {
            Some(cache) => cache,
            None => {
                let streams = self.fetch().await?;
                self.learn_source_id(&streams);
                RegistryCache::build(streams)
            }
        };
        Ok(self.cache.insert(cache))
    }

    async fn fetch(&self) -> Result<Vec<E>, RegistryError> {
        let listed = match self.session.get(E::LIST_ENDPOINT).await? {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ApiError::Parse(format!(
                    "expected a list from {}, got {other}",
                    E::LIST_ENDPOINT
                ))
                .into())
            }
            None => Vec::new(),
        };

        let mut streams = Vec::with_capacity(listed.len());
        for item in listed {
            let built = Document::from_value(item)
                .map_err(RegistryError::from)
                .and_then(|doc| Ok(E::from_document(doc, self.session.clone())?));
            match built {
                Ok(stream) => streams.push(stream),
                Err(e) => warn!(endpoint = E::LIST_ENDPOINT, error = %e, "Skipping unexpected stream"),
            }
        }

        debug!(
            endpoint = E::LIST_ENDPOINT,
            count = streams.len(),
            "Loaded stream list"
        );
        Ok(streams)
    }

    fn learn_source_id(&mut self, streams: &[E]) {
        if self.source_id.is_none() {
            self.source_id = streams
                .first()
                .map(|s| s.stream_id().source_id().to_string());
        }
    }
}
