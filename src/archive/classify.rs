use std::collections::BTreeSet;

use crate::domain::{DataType, MediaKind, Message};

/// Where a message's content goes. Media and text never both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Media { folder: DataType, extension: &'static str },
    Text,
}

pub fn classify(message: &Message, requested: &BTreeSet<DataType>) -> Option<Bucket> {
    let bucket = match message.media {
        MediaKind::Photo => Bucket::Media {
            folder: DataType::Images,
            extension: "jpg",
        },
        MediaKind::Video => Bucket::Media {
            folder: DataType::Videos,
            extension: "mp4",
        },
        MediaKind::Audio => Bucket::Media {
            folder: DataType::Audios,
            extension: "mp3",
        },
        MediaKind::Voice => Bucket::Media {
            folder: DataType::Audios,
            extension: "ogg",
        },
        MediaKind::VideoNote => Bucket::Media {
            folder: DataType::Audios,
            extension: "mp4",
        },
        MediaKind::None if !message.text.trim().is_empty() => Bucket::Text,
        MediaKind::None | MediaKind::Other => return None,
    };

    let wanted = match bucket {
        Bucket::Media { folder, .. } => folder,
        Bucket::Text => DataType::Text,
    };
    requested.contains(&wanted).then_some(bucket)
}
