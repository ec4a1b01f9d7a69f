//! In-memory channel and instant sleeper for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::channels::client::{
    Chat, ChannelMessage, MediaInfo, MediaPayload, MessageKind, OutgoingContent, SentMessage,
    SessionState, WhatsAppClient,
};
use crate::error::ChannelError;
use crate::relay::scheduler::Sleeper;

pub(crate) fn pdf_attachment() -> MediaPayload {
    MediaPayload {
        mime_type: "application/pdf".into(),
        data: b"%PDF-1.4 test".to_vec(),
        filename: "BOLETO.pdf".into(),
    }
}

/// Records requested sleeps and returns immediately.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub(crate) fn shared() -> Arc<dyn Sleeper> {
        Arc::new(Self::default())
    }

    pub(crate) fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, Copy)]
struct Echo {
    after_fetches: usize,
    include_media: bool,
}

#[derive(Default)]
struct State {
    session: VecDeque<SessionState>,
    unregistered: HashSet<String>,
    registration_checks: Vec<String>,
    chats: HashMap<String, Vec<ChannelMessage>>,
    pending_echoes: Vec<(usize, String, ChannelMessage)>,
    media: HashMap<String, MediaInfo>,
    sent: Vec<(String, OutgoingContent)>,
    echo: Option<Echo>,
    fail_text: bool,
    fail_media: bool,
    fail_fetches: usize,
    fetches: usize,
    next_id: u64,
}

/// Scriptable stand-in for the channel session.
#[derive(Default)]
pub(crate) struct FakeClient {
    state: Mutex<State>,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script_session(&self, states: impl IntoIterator<Item = SessionState>) {
        self.state.lock().unwrap().session = states.into_iter().collect();
    }

    pub(crate) fn unregister(&self, address: &str) {
        self.state.lock().unwrap().unregistered.insert(address.to_string());
    }

    pub(crate) fn create_chat(&self, address: &str) {
        self.state.lock().unwrap().chats.entry(address.to_string()).or_default();
    }

    pub(crate) fn push_history(&self, address: &str, msg: ChannelMessage) {
        self.state
            .lock()
            .unwrap()
            .chats
            .entry(address.to_string())
            .or_default()
            .push(msg);
    }

    /// Append `msg` to the chat once this many fetches have happened.
    pub(crate) fn push_history_after_fetches(&self, address: &str, after_fetches: usize, msg: ChannelMessage) {
        self.state
            .lock()
            .unwrap()
            .pending_echoes
            .push((after_fetches + 1, address.to_string(), msg));
    }

    pub(crate) fn set_media(&self, message_id: &str, media: MediaInfo) {
        self.state.lock().unwrap().media.insert(message_id.to_string(), media);
    }

    /// Sent payloads become visible in history once this many fetches have happened.
    pub(crate) fn echo_sends_after_fetches(&self, after_fetches: usize) {
        self.state.lock().unwrap().echo = Some(Echo {
            after_fetches,
            include_media: true,
        });
    }

    /// Echo text sends only; attachments never show up in history.
    pub(crate) fn echo_text_only(&self) {
        self.state.lock().unwrap().echo = Some(Echo {
            after_fetches: 0,
            include_media: false,
        });
    }

    pub(crate) fn fail_text_sends(&self) {
        self.state.lock().unwrap().fail_text = true;
    }

    pub(crate) fn fail_media_sends(&self) {
        self.state.lock().unwrap().fail_media = true;
    }

    pub(crate) fn fail_next_fetches(&self, n: usize) {
        self.state.lock().unwrap().fail_fetches = n;
    }

    pub(crate) fn sent(&self) -> Vec<(String, OutgoingContent)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    pub(crate) fn registration_checks(&self) -> Vec<String> {
        self.state.lock().unwrap().registration_checks.clone()
    }
}

#[async_trait]
impl WhatsAppClient for FakeClient {
    async fn session_state(&self) -> Result<SessionState, ChannelError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .session
            .pop_front()
            .unwrap_or(SessionState::Ready))
    }

    async fn is_registered_user(&self, address: &str) -> Result<bool, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.registration_checks.push(address.to_string());
        Ok(!state.unregistered.contains(address))
    }

    async fn send_message(
        &self,
        address: &str,
        content: OutgoingContent,
    ) -> Result<SentMessage, ChannelError> {
        let mut state = self.state.lock().unwrap();
        let is_media = matches!(content, OutgoingContent::Media(_));
        if (is_media && state.fail_media) || (!is_media && state.fail_text) {
            return Err(ChannelError::SendFailed {
                address: address.to_string(),
                reason: "simulated failure".into(),
            });
        }

        state.next_id += 1;
        let id = format!("sent-{}", state.next_id);
        state.sent.push((address.to_string(), content.clone()));

        if let Some(echo) = state.echo {
            if !is_media || echo.include_media {
                let (body, has_media, kind) = match content {
                    OutgoingContent::Text(text) => (text, false, MessageKind::Chat),
                    OutgoingContent::Media(_) => (String::new(), true, MessageKind::Document),
                };
                let msg = ChannelMessage {
                    id: id.clone(),
                    from: "me@c.us".into(),
                    from_me: true,
                    body,
                    has_media,
                    kind,
                    timestamp: 1_700_000_000 + state.next_id as i64,
                    ack: 1,
                };
                state
                    .pending_echoes
                    .push((echo.after_fetches + 1, address.to_string(), msg));
            }
        }

        Ok(SentMessage { id: Some(id) })
    }

    async fn get_chat_by_id(&self, address: &str) -> Result<Option<Chat>, ChannelError> {
        let state = self.state.lock().unwrap();
        Ok(state.chats.contains_key(address).then(|| Chat {
            id: address.to_string(),
            name: None,
        }))
    }

    async fn fetch_messages(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        let fetches = state.fetches;

        if state.fail_fetches > 0 {
            state.fail_fetches -= 1;
            return Err(ChannelError::FetchFailed {
                address: address.to_string(),
                reason: "simulated failure".into(),
            });
        }

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending_echoes)
            .into_iter()
            .partition(|(visible_at, _, _)| *visible_at <= fetches);
        state.pending_echoes = waiting;
        for (_, addr, msg) in ready {
            state.chats.entry(addr).or_default().push(msg);
        }

        let history = state.chats.get(address).cloned().unwrap_or_default();
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }

    async fn download_media(&self, message_id: &str) -> Result<Option<MediaInfo>, ChannelError> {
        Ok(self.state.lock().unwrap().media.get(message_id).cloned())
    }
}
