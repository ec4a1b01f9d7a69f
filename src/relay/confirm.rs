//! Confirmation poller.
//!
//! A successful send only means the channel accepted the payload. We read
//! the chat back a bounded number of times and look for both payloads among
//! the newest messages.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channels::client::{ChannelMessage, WhatsAppClient};
use crate::config::{ConfirmConfig, MAX_CONFIRM_ATTEMPTS};
use crate::error::RelayError;
use crate::relay::history::{is_sent_document, is_sent_text};
use crate::relay::scheduler::Sleeper;

/// Progress of a confirmation run. Flags stay set once observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfirmationState {
    pub text_confirmed: bool,
    pub file_confirmed: bool,
    pub attempts_used: u32,
}

impl ConfirmationState {
    pub fn is_complete(&self) -> bool {
        self.text_confirmed && self.file_confirmed
    }

    /// Fold a sample of recent messages into the flags.
    pub fn observe(&mut self, recent: &[ChannelMessage], expected_text: &str) {
        self.text_confirmed |= recent.iter().any(|m| is_sent_text(m, expected_text));
        self.file_confirmed |= recent.iter().any(is_sent_document);
    }

    /// `Ok` when both payloads were seen, otherwise a timeout naming what's missing.
    pub fn ensure_complete(&self) -> Result<(), RelayError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(RelayError::ConfirmationTimeout {
                text_confirmed: self.text_confirmed,
                file_confirmed: self.file_confirmed,
                attempts: self.attempts_used,
            })
        }
    }
}

pub struct ConfirmationPoller {
    client: Arc<dyn WhatsAppClient>,
    sleeper: Arc<dyn Sleeper>,
    config: ConfirmConfig,
}

impl ConfirmationPoller {
    pub fn new(
        client: Arc<dyn WhatsAppClient>,
        sleeper: Arc<dyn Sleeper>,
        config: ConfirmConfig,
    ) -> Self {
        Self {
            client,
            sleeper,
            config,
        }
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts.clamp(1, MAX_CONFIRM_ATTEMPTS)
    }

    /// Poll `chat_address` until both payloads show up or the attempt
    /// budget runs out. Fetch errors consume an attempt.
    pub async fn confirm_delivery(&self, chat_address: &str, expected_text: &str) -> ConfirmationState {
        let max_attempts = self.max_attempts();
        let sample = self.config.sample_size.max(1);
        let mut state = ConfirmationState::default();

        for attempt in 1..=max_attempts {
            state.attempts_used = attempt;

            match self.client.fetch_messages(chat_address, sample).await {
                Ok(messages) => {
                    let recent = &messages[messages.len().saturating_sub(sample)..];
                    state.observe(recent, expected_text);
                    debug!(
                        attempt,
                        text = state.text_confirmed,
                        file = state.file_confirmed,
                        "Confirmation poll"
                    );
                }
                Err(e) => {
                    warn!(attempt, address = %chat_address, error = %e, "Confirmation poll failed");
                }
            }

            if state.is_complete() {
                info!(attempt, address = %chat_address, "Delivery confirmed");
                return state;
            }

            if attempt < max_attempts {
                self.sleeper.sleep(self.config.interval).await;
            }
        }

        warn!(
            address = %chat_address,
            text = state.text_confirmed,
            file = state.file_confirmed,
            "Delivery not confirmed after {} attempts",
            max_attempts
        );
        state
    }
}
