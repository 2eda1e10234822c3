//! Cursor over a paginated stream
//!
//! A [`StreamCursor`] walks `/v3/streams/contents` or `/v3/streams/ids` one
//! page at a time. Items come out in server order and the traversal stops at
//! `max_count` items or when a page carries no continuation, whichever is
//! first. Nothing is fetched until the first call to [`StreamCursor::next`].

use futures_util::stream::{self, Stream};
use serde_json::Value;
use std::collections::VecDeque;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::data::Entry;
use crate::identifier::StreamId;
use crate::session::{quote_plus, ApiError, ApiResult, SharedSession};
use crate::stream::options::StreamOptions;

/// Consecutive empty pages tolerated before a traversal is abandoned
pub const MAX_EMPTY_PAGES: usize = 100;

/// What a stream endpoint returns
pub trait StreamKind {
    /// Item yielded by the cursor
    type Item;

    /// Path segment under `/v3/streams/`
    const ENDPOINT: &'static str;

    /// Response property holding the page items
    const ITEMS_PROPERTY: &'static str;

    /// Convert one raw item
    fn make_item(value: Value, session: &SharedSession) -> ApiResult<Self::Item>;
}

/// Full entries from `/v3/streams/contents`
#[derive(Debug, Clone, Copy)]
pub struct Contents;

impl StreamKind for Contents {
    type Item = Entry;
    const ENDPOINT: &'static str = "contents";
    const ITEMS_PROPERTY: &'static str = "items";

    fn make_item(value: Value, session: &SharedSession) -> ApiResult<Entry> {
        Entry::from_value(value, session.clone())
    }
}

/// Entry ids from `/v3/streams/ids`
#[derive(Debug, Clone, Copy)]
pub struct Ids;

impl StreamKind for Ids {
    type Item = String;
    const ENDPOINT: &'static str = "ids";
    const ITEMS_PROPERTY: &'static str = "ids";

    fn make_item(value: Value, _session: &SharedSession) -> ApiResult<String> {
        match value {
            Value::String(id) => Ok(id),
            other => Err(ApiError::Parse(format!("expected an entry id, got {other}"))),
        }
    }
}

/// Where the traversal stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Nothing requested yet
    Initial,
    /// Next page token
    Next(String),
    /// Server sent no continuation
    Exhausted,
}

/// Cursor over entries
pub type ContentStream = StreamCursor<Contents>;

/// Cursor over entry ids
pub type IdStream = StreamCursor<Ids>;

/// Lazy, bounded, restartable traversal of one stream
#[derive(Debug)]
pub struct StreamCursor<K: StreamKind> {
    session: SharedSession,
    stream_id: StreamId,
    options: StreamOptions,
    buffer: VecDeque<Value>,
    continuation: Continuation,
    yielded: usize,
    pages: usize,
    kind: PhantomData<fn() -> K>,
}

impl<K: StreamKind> StreamCursor<K> {
    /// Create a cursor; no request is sent until the first `next()`
    pub fn new(session: SharedSession, stream_id: StreamId, options: StreamOptions) -> Self {
        Self {
            session,
            stream_id,
            options,
            buffer: VecDeque::new(),
            continuation: Continuation::Initial,
            yielded: 0,
            pages: 0,
            kind: PhantomData,
        }
    }

    /// Stream being traversed
    pub fn id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Options of this traversal
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Items yielded since creation or the last reset
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Pages requested since creation or the last reset
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Current continuation state
    pub fn continuation(&self) -> &Continuation {
        &self.continuation
    }

    /// Next item, fetching a page when the buffer is empty
    ///
    /// A failed page request leaves the cursor unchanged, so calling again
    /// retries the same page.
    pub async fn next(&mut self) -> ApiResult<Option<K::Item>> {
        let max_count = self.options.max_count();
        let mut empty_pages = 0;

        loop {
            if self.yielded >= max_count {
                return Ok(None);
            }

            if let Some(value) = self.buffer.pop_front() {
                self.yielded += 1;
                return K::make_item(value, &self.session).map(Some);
            }

            if self.continuation == Continuation::Exhausted {
                return Ok(None);
            }

            if empty_pages >= MAX_EMPTY_PAGES {
                warn!(
                    stream_id = %self.stream_id,
                    empty_pages,
                    "Too many consecutive empty pages, stopping traversal"
                );
                self.continuation = Continuation::Exhausted;
                return Ok(None);
            }

            self.fetch_page().await?;
            if self.buffer.is_empty() {
                empty_pages += 1;
            }
        }
    }

    /// Start over; the next `next()` requests the first page again
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.continuation = Continuation::Initial;
        self.yielded = 0;
        self.pages = 0;
    }

    /// Drain the remaining items
    pub async fn collect_all(&mut self) -> ApiResult<Vec<K::Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt into a [`Stream`] of items
    pub fn into_stream(self) -> impl Stream<Item = ApiResult<K::Item>> {
        stream::try_unfold(self, |mut cursor| async move {
            let item = cursor.next().await?;
            Ok::<_, ApiError>(item.map(|item| (item, cursor)))
        })
    }

    /// Request path of the next page
    pub fn page_path(&self) -> String {
        let mut path = format!(
            "/v3/streams/{}?streamId={}",
            K::ENDPOINT,
            quote_plus(self.stream_id.id())
        );
        for (key, value) in self.options.to_query() {
            path.push('&');
            path.push_str(key);
            path.push('=');
            path.push_str(&quote_plus(&value));
        }

        let continuation = match &self.continuation {
            Continuation::Initial => self.options.continuation.as_deref(),
            Continuation::Next(token) => Some(token.as_str()),
            Continuation::Exhausted => None,
        };
        if let Some(token) = continuation.filter(|t| !t.is_empty()) {
            path.push_str("&continuation=");
            path.push_str(&quote_plus(token));
        }
        path
    }

    async fn fetch_page(&mut self) -> ApiResult<()> {
        if self.pages == 0 {
            debug!(
                stream_id = %self.stream_id,
                max_count = self.options.max_count(),
                page_size = self.options.count,
                "Starting stream traversal"
            );
        }

        let path = self.page_path();
        let mut body = self.session.get(&path).await?.unwrap_or(Value::Null);

        let items = match body.get_mut(K::ITEMS_PROPERTY).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let continuation = body
            .get("continuation")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        self.pages += 1;
        debug!(
            stream_id = %self.stream_id,
            page = self.pages,
            items = items.len(),
            continuation = ?continuation,
            "Fetched stream page"
        );

        self.buffer = items.into();
        self.continuation = match continuation {
            Some(token) => Continuation::Next(token),
            None => Continuation::Exhausted,
        };
        Ok(())
    }
}
