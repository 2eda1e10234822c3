//! Enterprise-only features: IoC export and MISP upload

pub mod ioc;
pub mod misp;

pub use ioc::{
    continuation_from_link, merge_pages, CsvTable, IocDownloader, IocDownloaderBuilder, IocError,
    IocExport, IocFormat, IocPage, IOC_ENDPOINT, MAX_IOC_PAGES,
};
pub use misp::{MispError, MispExporter};
