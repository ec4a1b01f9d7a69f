//! The messaging channel seam.
//!
//! Everything the relay needs from the automated messaging session goes
//! through [`WhatsAppClient`]. The production implementation talks to a
//! bridge process over HTTP ([`super::BridgeClient`]); tests swap in an
//! in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Domain suffix for individual contacts.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Build a contact address from a digit string.
pub fn contact_address(digits: &str) -> String {
    format!("{digits}{CONTACT_SUFFIX}")
}

/// State of the authenticated channel session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionState {
    /// Still booting the underlying client.
    Starting,
    /// Waiting for the phone to scan a pairing code.
    Pairing { qr: Option<String> },
    /// Authenticated and able to send.
    Ready,
}

/// A media payload ready for transmission.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub filename: String,
}

impl std::fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPayload")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("filename", &self.filename)
            .finish()
    }
}

/// What to send in a single `send_message` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingContent {
    Text(String),
    Media(MediaPayload),
}

/// Acknowledgement returned by the channel after transmission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentMessage {
    #[serde(default)]
    pub id: Option<String>,
}

/// A chat known to the session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Declared message type as reported by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Image,
    Video,
    Audio,
    /// Push-to-talk voice recording.
    Ptt,
    Document,
    Sticker,
    #[serde(other)]
    Other,
}

/// A raw message from chat history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub id: String,
    #[serde(default)]
    pub from: String,
    pub from_me: bool,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub has_media: bool,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Unix seconds.
    pub timestamp: i64,
    /// Acknowledgement code, only meaningful when `from_me`.
    #[serde(default)]
    pub ack: i32,
}

/// Metadata of a downloaded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub mime_type: String,
    pub filename: Option<String>,
}

/// Capability surface of the automated messaging session.
///
/// One instance is shared by every request. Implementations must not assume
/// calls are serialized.
#[async_trait]
pub trait WhatsAppClient: Send + Sync {
    /// Current session state (pairing / ready).
    async fn session_state(&self) -> Result<SessionState, ChannelError>;

    /// Whether `address` belongs to a registered account.
    async fn is_registered_user(&self, address: &str) -> Result<bool, ChannelError>;

    /// Transmit a payload. Success means the channel accepted it, not that
    /// the peer received it.
    async fn send_message(
        &self,
        address: &str,
        content: OutgoingContent,
    ) -> Result<SentMessage, ChannelError>;

    /// Look up a chat, `None` if the session has never talked to `address`.
    async fn get_chat_by_id(&self, address: &str) -> Result<Option<Chat>, ChannelError>;

    /// The `limit` most recent messages of a chat, oldest first.
    async fn fetch_messages(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChannelError>;

    /// Download the attachment of a message, `None` if it is no longer available.
    async fn download_media(&self, message_id: &str) -> Result<Option<MediaInfo>, ChannelError>;
}
