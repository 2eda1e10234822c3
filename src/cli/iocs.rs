//! `export-iocs` command

use chrono::{Duration, Utc};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use super::{Cli, CliError};
use crate::enterprise::{
    IocDownloader, IocDownloaderBuilder, IocExport, IocFormat, IocPage, MispExporter,
};
use crate::output::{write_ioc_rows, write_json};
use crate::session::SharedSession;

/// Streams the export is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IocSource {
    /// Team feeds
    EnterpriseCategories,
    /// Personal feeds
    UserCategories,
}

/// Export indicators of compromise
#[derive(Debug, Args)]
pub struct ExportIocsArgs {
    /// Export format: csv, stix or misp
    #[arg(long, default_value = "stix")]
    pub format: IocFormat,

    /// Only articles from the last N hours
    #[arg(long, default_value_t = 24)]
    pub hours: u32,

    /// Output file (default: iocs.csv or iocs.json)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Which feeds to export from
    #[arg(long, value_enum, default_value_t = IocSource::EnterpriseCategories)]
    pub source: IocSource,

    /// A single feed of the source, by name or id, instead of all of them
    #[arg(long)]
    pub stream: Option<String>,

    /// Send MISP events to this instance instead of writing a file
    #[arg(long, requires = "misp_key")]
    pub misp_url: Option<String>,

    /// MISP API key
    #[arg(long, requires = "misp_url")]
    pub misp_key: Option<String>,

    /// Keep going when MISP rejects an event
    #[arg(long, default_value_t = false)]
    pub ignore_errors: bool,

    /// Accept self-signed MISP certificates
    #[arg(long, default_value_t = false)]
    pub insecure: bool,
}

impl ExportIocsArgs {
    /// Execute the export-iocs command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        if self.misp_url.is_some() && self.format != IocFormat::Misp {
            return Err(CliError::InvalidArgument(
                "--misp-url requires --format misp".to_string(),
            ));
        }

        let downloader = self.downloader(cli.session()?).await?;
        info!(
            stream_id = downloader.stream_id(),
            format = %self.format,
            hours = self.hours,
            "Exporting IoCs"
        );

        if let (Some(url), Some(key)) = (&self.misp_url, &self.misp_key) {
            return self.send_to_misp(&downloader, url, key).await;
        }

        let export = downloader.download_all().await?;
        let path = self.output_path();
        match &export {
            IocExport::Csv(table) => {
                write_ioc_rows(&path, table)?;
            }
            IocExport::Stix(value) | IocExport::Misp(value) => write_json(&path, value)?,
        }
        println!("Exported {} IoCs to {}", export.len(), path.display());
        Ok(())
    }

    /// File written when no path is given
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| match self.format {
            IocFormat::Csv => PathBuf::from("iocs.csv"),
            IocFormat::Stix | IocFormat::Misp => PathBuf::from("iocs.json"),
        })
    }

    async fn downloader(&self, session: SharedSession) -> Result<IocDownloader, CliError> {
        let since = Utc::now() - Duration::hours(i64::from(self.hours));
        let mut builder = IocDownloaderBuilder::new(session, self.format).with_newer_than(since);

        let downloader = match (self.source, &self.stream) {
            (IocSource::EnterpriseCategories, None) => {
                builder.from_all_enterprise_categories().await?
            }
            (IocSource::EnterpriseCategories, Some(name)) => {
                builder.from_enterprise_category(name).await?
            }
            (IocSource::UserCategories, None) => builder.from_all_user_categories().await?,
            (IocSource::UserCategories, Some(name)) => builder.from_user_category(name).await?,
        };
        Ok(downloader)
    }

    async fn send_to_misp(
        &self,
        downloader: &IocDownloader,
        url: &str,
        key: &str,
    ) -> Result<(), CliError> {
        let mut exporter = MispExporter::new(url, key).with_ignore_errors(self.ignore_errors);
        if self.insecure {
            exporter = exporter.insecure()?;
        }

        let bundles: Vec<_> = downloader
            .download_pages()
            .await?
            .into_iter()
            .filter_map(|page| match page {
                IocPage::Json(value) => Some(value),
                IocPage::Csv(_) => None,
            })
            .collect();
        let sent = exporter.send_bundles(&bundles).await?;
        println!("Sent {sent} MISP events to {}", exporter.url());
        Ok(())
    }
}
