//! Error types for wa-relay.

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the messaging channel client.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel session not ready: {reason}")]
    NotReady { reason: String },

    #[error("Failed to send to {address}: {reason}")]
    SendFailed { address: String, reason: String },

    #[error("Failed to fetch history for {address}: {reason}")]
    FetchFailed { address: String, reason: String },

    #[error("Failed to download media for message {message_id}: {reason}")]
    MediaFailed { message_id: String, reason: String },

    #[error("Invalid response from channel: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Request rejected before any channel I/O.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Number, message and file are required")]
    MissingFields,

    #[error("Number is required")]
    MissingNumber,

    #[error("Upload is too large")]
    UploadTooLarge,

    #[error("Invalid number {number}: {digits} digits, expected 10 to 15")]
    InvalidNumber { number: String, digits: usize },
}

/// Failures of the send and read flows.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Number {address} is not registered on the channel")]
    NotRegistered { address: String },

    #[error("Delivery not confirmed after {attempts} attempts (unconfirmed: {})", unconfirmed_label(.text_confirmed, .file_confirmed))]
    ConfirmationTimeout {
        text_confirmed: bool,
        file_confirmed: bool,
        attempts: u32,
    },

    #[error("Chat not found: {address}")]
    ChatNotFound { address: String },

    #[error("No messages found for {address}")]
    NoMessages { address: String },

    #[error("Failed to stage attachment {name}: {source}")]
    Staging {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

fn unconfirmed_label(text_confirmed: &bool, file_confirmed: &bool) -> &'static str {
    match (*text_confirmed, *file_confirmed) {
        (false, false) => "text, file",
        (true, false) => "file",
        (false, true) => "text",
        (true, true) => "none",
    }
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
