//! Classification of raw channel messages into one-line summaries and
//! delivery-state labels. Shared by confirmation polling and the history
//! read endpoint.

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::channels::client::{ChannelMessage, MediaInfo, MessageKind};

/// Mimetype the channel uses for recorded voice notes.
pub const VOICE_NOTE_MIME: &str = "audio/ogg; codecs=opus";

/// What a message is, for display and matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Image,
    Video,
    VoiceNote,
    AudioFile,
    Document { filename: Option<String> },
    Sticker,
    /// Media of a kind we don't single out.
    File,
    Text(String),
    Other,
}

impl Classification {
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document { .. })
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image received"),
            Self::Video => f.write_str("video received"),
            Self::VoiceNote => f.write_str("voice note received"),
            Self::AudioFile => f.write_str("audio file received"),
            Self::Document { filename } => {
                write!(f, "document received: {}", filename.as_deref().unwrap_or("unknown"))
            }
            Self::Sticker => f.write_str("sticker received"),
            Self::File => f.write_str("file received"),
            Self::Text(body) => write!(f, "text: {body}"),
            Self::Other => f.write_str("other message type"),
        }
    }
}

/// Classify a message. `media` is the downloaded attachment metadata, if any;
/// it only refines audio and document summaries.
pub fn classify(msg: &ChannelMessage, media: Option<&MediaInfo>) -> Classification {
    if msg.has_media {
        return match msg.kind {
            MessageKind::Image => Classification::Image,
            MessageKind::Video => Classification::Video,
            MessageKind::Audio | MessageKind::Ptt => match media {
                Some(m) if m.mime_type == VOICE_NOTE_MIME => Classification::VoiceNote,
                _ => Classification::AudioFile,
            },
            MessageKind::Document => Classification::Document {
                filename: media.and_then(|m| m.filename.clone()),
            },
            MessageKind::Sticker => Classification::Sticker,
            MessageKind::Chat | MessageKind::Other => Classification::File,
        };
    }

    if !msg.body.is_empty() {
        return Classification::Text(msg.body.clone());
    }

    Classification::Other
}

/// Acknowledgement level of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Sent,
    Delivered,
    Read,
    Unknown,
    /// Authored by the peer; acks don't apply.
    Received,
}

impl DeliveryState {
    /// Total mapping of the channel's ack ordinal.
    pub fn from_ack(code: i32) -> Self {
        match code {
            0 => Self::Pending,
            1 => Self::Sent,
            2 => Self::Delivered,
            3 => Self::Read,
            _ => Self::Unknown,
        }
    }

    pub fn of(msg: &ChannelMessage) -> Self {
        if msg.from_me {
            Self::from_ack(msg.ack)
        } else {
            Self::Received
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Unknown => "unknown",
            Self::Received => "received",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// A display-ready history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub summary: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub direction: Direction,
    pub delivery_state: DeliveryState,
}

impl HistoryEntry {
    pub fn from_message(msg: &ChannelMessage, media: Option<&MediaInfo>) -> Self {
        Self {
            summary: classify(msg, media).to_string(),
            timestamp: msg.timestamp,
            direction: if msg.from_me {
                Direction::Sent
            } else {
                Direction::Received
            },
            delivery_state: DeliveryState::of(msg),
        }
    }
}

/// Self-authored text whose body is exactly `expected`.
pub fn is_sent_text(msg: &ChannelMessage, expected: &str) -> bool {
    msg.from_me && msg.body == expected
}

/// Self-authored message carrying a document attachment.
pub fn is_sent_document(msg: &ChannelMessage) -> bool {
    msg.from_me && msg.has_media && classify(msg, None).is_document()
}

/// Render a unix timestamp in local time with a chrono format string.
pub fn format_timestamp(timestamp: i64, format: &str) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(utc) => utc.with_timezone(&Local).format(format).to_string(),
        None => timestamp.to_string(),
    }
}
