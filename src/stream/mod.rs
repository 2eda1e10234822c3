//! Paginated stream traversal

pub mod cursor;
pub mod options;

pub use cursor::{Contents, ContentStream, Continuation, IdStream, Ids, StreamCursor, StreamKind};
pub use options::{Ranking, StreamOptions};
