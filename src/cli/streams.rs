//! `list-streams` and `stream-entries` commands

use chrono::Utc;
use clap::Args;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{Cli, CliError};
use crate::data::{FeedlyUser, Streamable};
use crate::identifier::{StreamId, GLOBAL_ALL};
use crate::registry::RegistryEntity;
use crate::shutdown::SharedShutdown;
use crate::stream::{ContentStream, Ranking, StreamCursor, StreamOptions};

/// List feeds and boards
#[derive(Debug, Args)]
pub struct ListStreamsArgs {
    /// Print JSON instead of a human-readable listing
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl ListStreamsArgs {
    /// Execute the list-streams command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let session = cli.session()?;
        let mut user = session.user();

        let mut sections = vec![
            ("User feeds", listing(user.user_categories().await?.streams().await?)),
            ("User boards", listing(user.user_tags().await?.streams().await?)),
        ];
        if user.profile().await?.contains_key("enterpriseName") {
            sections.push((
                "Team feeds",
                listing(user.enterprise_categories().await?.streams().await?),
            ));
            sections.push((
                "Team boards",
                listing(user.enterprise_tags().await?.streams().await?),
            ));
        }

        if self.json {
            println!("{}", sections_to_json(&sections));
        } else {
            for (title, streams) in &sections {
                println!("{title}:");
                for (label, id) in streams {
                    println!("  {label}  ({id})");
                }
                println!();
            }
        }
        Ok(())
    }
}

fn listing<E: RegistryEntity>(streams: &[E]) -> Vec<(String, String)> {
    let mut listed: Vec<(String, String)> = streams
        .iter()
        .map(|s| (s.label().to_string(), s.id().to_string()))
        .collect();
    listed.sort();
    listed
}

fn sections_to_json(sections: &[(&str, Vec<(String, String)>)]) -> Value {
    let mut out = Map::new();
    for (title, streams) in sections {
        let key = title.to_lowercase().replace(' ', "_");
        let items = streams
            .iter()
            .map(|(label, id)| json!({ "label": label, "id": id }))
            .collect();
        out.insert(key, Value::Array(items));
    }
    Value::Object(out)
}

/// Print entries of a feed or board
#[derive(Debug, Args)]
pub struct StreamEntriesArgs {
    /// Feed or board name, id, or `global.all`
    pub stream: String,

    /// Maximum number of entries
    #[arg(long, default_value_t = 10)]
    pub max_count: usize,

    /// Look the stream up among team streams
    #[arg(long, default_value_t = false)]
    pub enterprise: bool,

    /// Look the stream up among boards instead of feeds
    #[arg(long, default_value_t = false)]
    pub tag: bool,

    /// Ordering: newest, oldest or engagement
    #[arg(long, default_value = "newest")]
    pub ranked: Ranking,

    /// Only unread entries
    #[arg(long, default_value_t = false)]
    pub unread_only: bool,

    /// Only entries from the last N hours
    #[arg(long)]
    pub hours: Option<u32>,

    /// Print each entry as one JSON line
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl StreamEntriesArgs {
    /// Execute the stream-entries command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let session = cli.session()?;
        let mut user = session.user();
        let stream_id = self.resolve(&mut user).await?;
        info!(stream_id = %stream_id, "Streaming entries");

        let mut cursor: ContentStream = StreamCursor::new(session, stream_id, self.options());
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => None,
                next = cursor.next() => Some(next?),
            };
            let Some(next) = next else {
                warn!(printed = cursor.yielded(), "Interrupted, stopping");
                break;
            };
            let Some(entry) = next else {
                break;
            };

            if self.json {
                println!("{}", entry.doc().to_value());
            } else {
                println!("{}", entry.title().unwrap_or("(untitled)"));
            }
        }

        info!(
            entries = cursor.yielded(),
            pages = cursor.pages_fetched(),
            "Stream finished"
        );
        Ok(())
    }

    /// Options derived from the flags
    pub fn options(&self) -> StreamOptions {
        let mut options = StreamOptions::default()
            .with_max_count(self.max_count)
            .with_ranking(self.ranked)
            .with_unread_only(self.unread_only);
        if let Some(hours) = self.hours {
            let since = Utc::now() - chrono::Duration::hours(i64::from(hours));
            options = options.with_newer_than(since.timestamp_millis());
        }
        options
    }

    async fn resolve(&self, user: &mut FeedlyUser) -> Result<StreamId, CliError> {
        if self.stream == GLOBAL_ALL && !self.tag {
            let stream_id = if self.enterprise {
                user.all_enterprise_categories_stream().await?.stream_id().clone()
            } else {
                user.all_user_categories_stream().await?.stream_id().clone()
            };
            return Ok(stream_id);
        }

        let stream_id = match (self.enterprise, self.tag) {
            (false, false) => user.user_categories().await?.get(&self.stream).await?.stream_id().clone(),
            (false, true) => user.user_tags().await?.get(&self.stream).await?.stream_id().clone(),
            (true, false) => user
                .enterprise_categories()
                .await?
                .get(&self.stream)
                .await?
                .stream_id()
                .clone(),
            (true, true) => user.enterprise_tags().await?.get(&self.stream).await?.stream_id().clone(),
        };
        Ok(stream_id)
    }
}
