//! Dispatch sequencer: text first, then the attachment, each behind a
//! jittered wait. Channel failures are captured in the outcome, never
//! raised.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::channels::client::{MediaPayload, OutgoingContent, WhatsAppClient};
use crate::config::DispatchConfig;
use crate::error::{ChannelError, RelayError, Result};
use crate::relay::normalize::AddressVariant;
use crate::relay::scheduler::JitteredScheduler;

/// Which of the two sends failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStep {
    Text,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub step: DispatchStep,
    pub reason: String,
}

/// Result of one delivery attempt against one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub address: String,
    pub text_sent: bool,
    pub file_sent: bool,
    pub error: Option<DispatchFailure>,
}

impl DispatchOutcome {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            text_sent: false,
            file_sent: false,
            error: None,
        }
    }

    fn fail(mut self, step: DispatchStep, err: &ChannelError) -> Self {
        self.error = Some(DispatchFailure {
            step,
            reason: err.to_string(),
        });
        self
    }

    pub fn is_complete(&self) -> bool {
        self.text_sent && self.file_sent
    }
}

/// Sends the two dependent payloads of a request.
pub struct DispatchSequencer {
    client: Arc<dyn WhatsAppClient>,
    scheduler: Arc<JitteredScheduler>,
    config: DispatchConfig,
}

impl DispatchSequencer {
    pub fn new(
        client: Arc<dyn WhatsAppClient>,
        scheduler: Arc<JitteredScheduler>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            client,
            scheduler,
            config,
        }
    }

    /// Fail fast with `NotRegistered` unless the channel knows `variant`.
    pub async fn ensure_registered(&self, variant: &AddressVariant) -> Result<()> {
        if self.client.is_registered_user(&variant.address).await? {
            Ok(())
        } else {
            info!(address = %variant.address, "Destination is not registered");
            Err(RelayError::NotRegistered {
                address: variant.address.clone(),
            }
            .into())
        }
    }

    /// Wait, send the text, and only if that succeeded wait again and send
    /// the attachment.
    pub async fn attempt_delivery(
        &self,
        variant: &AddressVariant,
        text: &str,
        attachment: &MediaPayload,
    ) -> DispatchOutcome {
        let address = variant.address.as_str();
        let mut outcome = DispatchOutcome::new(address);

        self.pace().await;
        match self
            .client
            .send_message(address, OutgoingContent::Text(text.to_string()))
            .await
        {
            Ok(_) => {
                info!(address, "Text message sent");
                outcome.text_sent = true;
            }
            Err(e) => {
                error!(address, error = %e, "Failed to send text message");
                return outcome.fail(DispatchStep::Text, &e);
            }
        }

        self.pace().await;
        match self
            .client
            .send_message(address, OutgoingContent::Media(attachment.clone()))
            .await
        {
            Ok(_) => {
                info!(address, file = %attachment.filename, "Attachment sent");
                outcome.file_sent = true;
                outcome
            }
            Err(e) => {
                error!(address, file = %attachment.filename, error = %e, "Failed to send attachment");
                outcome.fail(DispatchStep::File, &e)
            }
        }
    }

    async fn pace(&self) {
        self.scheduler
            .wait_random(self.config.jitter_min, self.config.jitter_max)
            .await;
    }
}
