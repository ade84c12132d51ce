pub mod job;
pub mod message;

pub use job::{DataType, DateWindow, ScrapeJob};
pub use message::{ExtractedLink, MediaKind, Message, UrlAnnotation};
