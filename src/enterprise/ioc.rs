//! Bulk export of indicators of compromise
//!
//! The export endpoint returns one page per call in the requested format and
//! points at the next page through a `link: <url>` header whose query carries
//! a `continuation` token. [`IocDownloader`] walks every page and merges them
//! into a single [`IocExport`].

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data::{FeedlyUser, Streamable};
use crate::registry::RegistryError;
use crate::session::{quote_plus, ApiError, RequestOptions, SharedSession};

/// Export endpoint
pub const IOC_ENDPOINT: &str = "/v3/enterprise/ioc";

/// Upper bound on pages followed in one export
pub const MAX_IOC_PAGES: usize = 1_000;

/// Errors from an IoC export
#[derive(Debug, thiserror::Error)]
pub enum IocError {
    /// Export request failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Source stream could not be resolved
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// CSV page could not be read
    #[error("invalid CSV page: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON page lacks the list being merged
    #[error("{format} page has no '{field}' list")]
    MissingField {
        /// Export format
        format: IocFormat,
        /// Expected list field
        field: &'static str,
    },
}

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IocFormat {
    /// MISP events
    Misp,
    /// STIX 2.1 bundle
    Stix,
    /// Flat CSV rows
    Csv,
}

impl IocFormat {
    /// Value of the `format` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            IocFormat::Misp => "misp",
            IocFormat::Stix => "stix2.1",
            IocFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for IocFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for IocFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "misp" => Ok(IocFormat::Misp),
            "stix" | "stix2.1" => Ok(IocFormat::Stix),
            "csv" => Ok(IocFormat::Csv),
            other => Err(format!(
                "unknown IoC format '{other}', expected one of: csv, stix, misp"
            )),
        }
    }
}

/// CSV export held as a header row plus records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    /// Column names
    pub headers: Vec<String>,
    /// Records, one value per column
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Read a CSV body whose first line is the header
    pub fn parse(body: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in record `row`
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    /// Append another page, aligning its columns by name
    ///
    /// Columns only the new page has are added to the header and existing
    /// records get an empty cell for them; missing values become empty.
    pub fn append(&mut self, other: CsvTable) {
        if self.headers.is_empty() {
            *self = other;
            return;
        }
        if self.headers == other.headers {
            self.rows.extend(other.rows);
            return;
        }

        for header in &other.headers {
            if !self.headers.contains(header) {
                self.headers.push(header.clone());
            }
        }
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }

        let mapping: Vec<Option<usize>> = self
            .headers
            .iter()
            .map(|h| other.headers.iter().position(|o| o == h))
            .collect();
        for row in other.rows {
            self.rows.push(
                mapping
                    .iter()
                    .map(|index| {
                        index
                            .and_then(|i| row.get(i).cloned())
                            .unwrap_or_default()
                    })
                    .collect(),
            );
        }
    }
}

/// One downloaded page
#[derive(Debug, Clone, PartialEq)]
pub enum IocPage {
    /// STIX or MISP page
    Json(Value),
    /// CSV page
    Csv(CsvTable),
}

/// Merged export
#[derive(Debug, Clone, PartialEq)]
pub enum IocExport {
    /// Single STIX bundle
    Stix(Value),
    /// `{"response": [...]}` with every MISP event
    Misp(Value),
    /// Every CSV record
    Csv(CsvTable),
}

impl IocExport {
    /// Number of STIX objects, MISP events or CSV records
    pub fn len(&self) -> usize {
        let list_len = |value: &Value, field: &str| {
            value
                .get(field)
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        };
        match self {
            IocExport::Stix(bundle) => list_len(bundle, "objects"),
            IocExport::Misp(events) => list_len(events, "response"),
            IocExport::Csv(table) => table.len(),
        }
    }

    /// Whether nothing was exported
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extract the `continuation` parameter from a `link: <url>` header
pub fn continuation_from_link(link: &str) -> Option<String> {
    let target = link.trim().strip_prefix('<')?;
    let target = &target[..target.find('>')?];
    let query = target.split_once('?').map_or(target, |(_, query)| query);

    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "continuation")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Merge downloaded pages into one export
pub fn merge_pages(format: IocFormat, pages: Vec<IocPage>) -> Result<IocExport, IocError> {
    match format {
        IocFormat::Csv => {
            let mut table = CsvTable::default();
            for page in pages {
                if let IocPage::Csv(page) = page {
                    table.append(page);
                }
            }
            Ok(IocExport::Csv(table))
        }
        IocFormat::Stix => {
            let objects = concat_lists(format, pages, "objects")?;
            Ok(IocExport::Stix(json!({
                "objects": objects,
                "id": format!("bundle--{}", Uuid::new_v4()),
                "type": "bundle",
            })))
        }
        IocFormat::Misp => {
            let events = concat_lists(format, pages, "response")?;
            Ok(IocExport::Misp(json!({ "response": events })))
        }
    }
}

fn concat_lists(
    format: IocFormat,
    pages: Vec<IocPage>,
    field: &'static str,
) -> Result<Vec<Value>, IocError> {
    let mut merged = Vec::new();
    for page in pages {
        let IocPage::Json(mut value) = page else {
            continue;
        };
        match value.get_mut(field).map(Value::take) {
            Some(Value::Array(items)) => merged.extend(items),
            _ => return Err(IocError::MissingField { format, field }),
        }
    }
    Ok(merged)
}

/// Downloads every page of one stream's export
#[derive(Debug, Clone)]
pub struct IocDownloader {
    session: SharedSession,
    format: IocFormat,
    newer_than: Option<DateTime<Utc>>,
    stream_id: String,
    max_pages: usize,
}

impl IocDownloader {
    /// Downloader for a stream id
    pub fn new(
        session: SharedSession,
        format: IocFormat,
        newer_than: Option<DateTime<Utc>>,
        stream_id: impl Into<String>,
    ) -> Self {
        Self {
            session,
            format,
            newer_than,
            stream_id: stream_id.into(),
            max_pages: MAX_IOC_PAGES,
        }
    }

    /// Cap the number of pages followed
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Stream being exported
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Export format
    pub fn format(&self) -> IocFormat {
        self.format
    }

    /// Path of one export request
    pub fn page_path(&self, continuation: Option<&str>) -> String {
        let mut path = format!(
            "{IOC_ENDPOINT}?streamId={}&format={}",
            quote_plus(&self.stream_id),
            quote_plus(self.format.as_query())
        );
        if let Some(newer_than) = self.newer_than {
            path.push_str(&format!("&newerThan={}", newer_than.timestamp()));
        }
        if let Some(continuation) = continuation {
            path.push_str("&continuation=");
            path.push_str(&quote_plus(continuation));
        }
        path
    }

    /// Download every page and merge them
    pub async fn download_all(&self) -> Result<IocExport, IocError> {
        let pages = self.download_pages().await?;
        let export = merge_pages(self.format, pages)?;
        info!(
            stream_id = %self.stream_id,
            format = %self.format,
            count = export.len(),
            "IoC export complete"
        );
        Ok(export)
    }

    /// Download every page without merging
    pub async fn download_pages(&self) -> Result<Vec<IocPage>, IocError> {
        let mut pages = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let (page, next) = self.fetch_page(continuation.as_deref()).await?;
            pages.push(page);

            match next {
                Some(next) if continuation.as_deref() == Some(next.as_str()) => {
                    warn!(stream_id = %self.stream_id, "Export returned the same continuation twice, stopping");
                    break;
                }
                Some(_) if pages.len() >= self.max_pages => {
                    warn!(
                        stream_id = %self.stream_id,
                        pages = pages.len(),
                        "Reached the IoC page limit, stopping"
                    );
                    break;
                }
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        Ok(pages)
    }

    async fn fetch_page(
        &self,
        continuation: Option<&str>,
    ) -> Result<(IocPage, Option<String>), IocError> {
        let path = self.page_path(continuation);
        let response = self
            .session
            .request_raw(&path, RequestOptions::get())
            .await?;

        let page = match self.format {
            IocFormat::Csv => IocPage::Csv(CsvTable::parse(&response.body)?),
            IocFormat::Stix | IocFormat::Misp => {
                let value = serde_json::from_str(&response.body)
                    .map_err(|e| ApiError::Parse(format!("invalid IoC page: {e}")))?;
                IocPage::Json(value)
            }
        };
        let next = response.header("link").and_then(continuation_from_link);

        debug!(
            stream_id = %self.stream_id,
            has_next = next.is_some(),
            "Fetched IoC page"
        );
        Ok((page, next))
    }
}

/// Picks the stream to export
///
/// ```no_run
/// # async fn run(session: feedly_client::session::SharedSession) -> Result<(), feedly_client::enterprise::IocError> {
/// use feedly_client::enterprise::{IocDownloaderBuilder, IocFormat};
///
/// let mut builder = IocDownloaderBuilder::new(session, IocFormat::Stix);
/// let export = builder
///     .from_enterprise_category("Threat Intel")
///     .await?
///     .download_all()
///     .await?;
/// println!("{} objects", export.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IocDownloaderBuilder {
    session: SharedSession,
    user: FeedlyUser,
    format: IocFormat,
    newer_than: Option<DateTime<Utc>>,
}

impl IocDownloaderBuilder {
    /// Builder exporting in `format`
    pub fn new(session: SharedSession, format: IocFormat) -> Self {
        Self {
            user: session.user(),
            session,
            format,
            newer_than: None,
        }
    }

    /// Only export articles newer than this instant
    pub fn with_newer_than(mut self, newer_than: DateTime<Utc>) -> Self {
        self.newer_than = Some(newer_than);
        self
    }

    /// User whose streams are resolved
    pub fn user(&mut self) -> &mut FeedlyUser {
        &mut self.user
    }

    /// Every team category
    pub async fn from_all_enterprise_categories(&mut self) -> Result<IocDownloader, IocError> {
        let stream = self.user.all_enterprise_categories_stream().await?;
        Ok(self.from_stream(&stream))
    }

    /// Every personal category
    pub async fn from_all_user_categories(&mut self) -> Result<IocDownloader, IocError> {
        let stream = self.user.all_user_categories_stream().await?;
        Ok(self.from_stream(&stream))
    }

    /// One team category, by name or id
    pub async fn from_enterprise_category(
        &mut self,
        name_or_id: &str,
    ) -> Result<IocDownloader, IocError> {
        let stream = self
            .user
            .enterprise_categories()
            .await?
            .get(name_or_id)
            .await?;
        Ok(self.from_stream(&stream))
    }

    /// One team tag, by name or id
    pub async fn from_enterprise_tag(&mut self, name_or_id: &str) -> Result<IocDownloader, IocError> {
        let stream = self.user.enterprise_tags().await?.get(name_or_id).await?;
        Ok(self.from_stream(&stream))
    }

    /// One personal category, by name or id
    pub async fn from_user_category(&mut self, name_or_id: &str) -> Result<IocDownloader, IocError> {
        let stream = self.user.user_categories().await?.get(name_or_id).await?;
        Ok(self.from_stream(&stream))
    }

    /// Any streamable
    pub fn from_stream<S: Streamable>(&self, stream: &S) -> IocDownloader {
        self.from_stream_id(stream.id())
    }

    /// A raw stream id
    pub fn from_stream_id(&self, stream_id: &str) -> IocDownloader {
        IocDownloader::new(
            self.session.clone(),
            self.format,
            self.newer_than,
            stream_id,
        )
    }
}
