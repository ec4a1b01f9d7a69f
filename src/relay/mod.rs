//! The relay core: validate → normalize → register check → dispatch →
//! confirm, plus the history read flow.

pub mod confirm;
pub mod dispatch;
pub mod history;
pub mod normalize;
pub mod scheduler;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::channels::client::{MediaPayload, WhatsAppClient};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result, ValidationError};

pub use confirm::{ConfirmationPoller, ConfirmationState};
pub use dispatch::{DispatchOutcome, DispatchSequencer, DispatchStep};
pub use history::{DeliveryState, Direction, HistoryEntry};
pub use normalize::{AddressVariant, AddressVariants, normalize};
pub use scheduler::{JitteredScheduler, Sleeper, TokioSleeper};

/// A validated send request.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub destination_number: String,
    pub text_body: String,
    pub attachment: MediaPayload,
}

impl SendRequest {
    /// All three parts must be present and non-empty (the attachment may be
    /// zero bytes, but must exist).
    pub fn from_parts(
        number: Option<String>,
        message: Option<String>,
        attachment: Option<MediaPayload>,
    ) -> std::result::Result<Self, ValidationError> {
        let number = number.filter(|n| !n.trim().is_empty());
        let message = message.filter(|m| !m.is_empty());
        match (number, message, attachment) {
            (Some(destination_number), Some(text_body), Some(attachment)) => Ok(Self {
                destination_number,
                text_body,
                attachment,
            }),
            _ => Err(ValidationError::MissingFields),
        }
    }
}

/// Everything learned from one send request.
#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    pub variants: AddressVariants,
    pub dispatch: DispatchOutcome,
    pub confirmation: ConfirmationState,
}

impl SendReport {
    pub fn is_confirmed(&self) -> bool {
        self.confirmation.is_complete()
    }

    pub fn ensure_confirmed(&self) -> std::result::Result<(), RelayError> {
        self.confirmation.ensure_complete()
    }
}

/// Shared relay service. One per process, cloned into every request.
pub struct RelayService {
    client: Arc<dyn WhatsAppClient>,
    sequencer: DispatchSequencer,
    poller: ConfirmationPoller,
    history_limit: usize,
}

impl RelayService {
    pub fn new(
        client: Arc<dyn WhatsAppClient>,
        sleeper: Arc<dyn Sleeper>,
        config: &RelayConfig,
    ) -> Self {
        let scheduler = Arc::new(JitteredScheduler::new(Arc::clone(&sleeper)));
        Self::with_scheduler(client, sleeper, scheduler, config)
    }

    /// Build with an explicit scheduler (e.g. seeded for reproducible runs).
    pub fn with_scheduler(
        client: Arc<dyn WhatsAppClient>,
        sleeper: Arc<dyn Sleeper>,
        scheduler: Arc<JitteredScheduler>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            sequencer: DispatchSequencer::new(Arc::clone(&client), scheduler, config.dispatch),
            poller: ConfirmationPoller::new(Arc::clone(&client), sleeper, config.confirm),
            client,
            history_limit: config.history_limit,
        }
    }

    /// Run the full send protocol against the as-given variant.
    ///
    /// Returns a report even when delivery is unconfirmed; only validation,
    /// registration and registration-check transport failures are errors.
    pub async fn send(&self, request: &SendRequest) -> Result<SendReport> {
        let variants = normalize(&request.destination_number)?;
        let primary = variants.primary();

        info!(
            number = %request.destination_number,
            address = %primary.address,
            alternates = variants.alternates().len(),
            "Dispatching message and attachment"
        );

        self.sequencer.ensure_registered(primary).await?;

        let dispatch = self
            .sequencer
            .attempt_delivery(primary, &request.text_body, &request.attachment)
            .await;

        let confirmation = self
            .poller
            .confirm_delivery(&primary.address, &request.text_body)
            .await;

        if !confirmation.is_complete() {
            warn!(
                address = %primary.address,
                text_sent = dispatch.text_sent,
                file_sent = dispatch.file_sent,
                "Send finished without full confirmation"
            );
        }

        Ok(SendReport {
            variants,
            dispatch,
            confirmation,
        })
    }

    /// Recent history with `number`, oldest first.
    pub async fn read_history(&self, number: Option<&str>) -> Result<Vec<HistoryEntry>> {
        let number = number
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ValidationError::MissingNumber)?;
        let variants = normalize(number)?;
        let address = &variants.primary().address;

        if self.client.get_chat_by_id(address).await?.is_none() {
            return Err(RelayError::ChatNotFound {
                address: address.clone(),
            }
            .into());
        }

        info!(address = %address, limit = self.history_limit, "Fetching chat history");
        let mut messages = self.client.fetch_messages(address, self.history_limit).await?;
        if messages.is_empty() {
            return Err(RelayError::NoMessages {
                address: address.clone(),
            }
            .into());
        }
        messages.sort_by_key(|m| m.timestamp);

        let mut entries = Vec::with_capacity(messages.len());
        for msg in &messages {
            let media = if msg.has_media {
                match self.client.download_media(&msg.id).await {
                    Ok(media) => media,
                    Err(e) => {
                        warn!(message_id = %msg.id, error = %e, "Media download failed");
                        None
                    }
                }
            } else {
                None
            };
            entries.push(HistoryEntry::from_message(msg, media.as_ref()));
        }
        Ok(entries)
    }
}
