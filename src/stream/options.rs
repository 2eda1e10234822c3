//! Paging options for stream requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default page size requested from the server
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default cap on items yielded by one traversal
pub const DEFAULT_MAX_COUNT: usize = 100;

/// Ordering of stream items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ranking {
    /// Most recent first
    #[default]
    Newest,
    /// Oldest first
    Oldest,
    /// Most engaging first
    Engagement,
}

impl Ranking {
    /// Query parameter value
    pub fn as_str(&self) -> &'static str {
        match self {
            Ranking::Newest => "newest",
            Ranking::Oldest => "oldest",
            Ranking::Engagement => "engagement",
        }
    }
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ranking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(Ranking::Newest),
            "oldest" => Ok(Ranking::Oldest),
            "engagement" => Ok(Ranking::Engagement),
            other => Err(format!(
                "unknown ranking '{other}', expected newest, oldest or engagement"
            )),
        }
    }
}

/// Options of one stream traversal
///
/// Public fields map one-to-one onto query parameters. `max_count` is a
/// client-side cap and never sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Page size
    pub count: u32,
    /// Ordering
    pub ranked: Ranking,
    /// Only unread entries
    pub unread_only: bool,
    /// Lower bound on entry timestamps, milliseconds since epoch
    pub newer_than: Option<i64>,
    /// Continuation to start from instead of the first page
    pub continuation: Option<String>,
    max_count: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_PAGE_SIZE,
            ranked: Ranking::Newest,
            unread_only: false,
            newer_than: None,
            continuation: None,
            max_count: DEFAULT_MAX_COUNT,
        }
    }
}

impl StreamOptions {
    /// Set the page size
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Set the ordering
    pub fn with_ranking(mut self, ranked: Ranking) -> Self {
        self.ranked = ranked;
        self
    }

    /// Only request unread entries
    pub fn with_unread_only(mut self, unread_only: bool) -> Self {
        self.unread_only = unread_only;
        self
    }

    /// Only request entries newer than `millis`
    pub fn with_newer_than(mut self, millis: i64) -> Self {
        self.newer_than = Some(millis);
        self
    }

    /// Start from a known continuation
    pub fn with_continuation(mut self, continuation: impl Into<String>) -> Self {
        self.continuation = Some(continuation.into());
        self
    }

    /// Change the traversal cap
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    /// Traversal cap
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Paging query parameters, unset fields omitted
    ///
    /// The continuation is not included; the cursor adds it per page.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("count", self.count.to_string()),
            ("ranked", self.ranked.to_string()),
            ("unreadOnly", self.unread_only.to_string()),
        ];
        if let Some(newer_than) = self.newer_than {
            query.push(("newerThan", newer_than.to_string()));
        }
        query
    }
}
