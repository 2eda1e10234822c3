//! Typed views over API documents

pub mod document;
pub mod entities;
pub mod user;

pub use document::Document;
pub use entities::{
    EnterpriseCategory, EnterpriseTag, Entry, Streamable, TagOps, UserCategory, UserTag,
    DEFAULT_IGNORED_STATUSES, TAG_BATCH_SIZE,
};
pub use user::FeedlyUser;
