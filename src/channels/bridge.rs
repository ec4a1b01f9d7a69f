//! HTTP bridge channel: drives the messaging session through a local
//! bridge process that owns the paired web client.
//!
//! Bridge REST contract:
//! - `GET  /session`                         → `{"state": "starting" | "pairing" | "ready", "qr"?}`
//! - `GET  /contacts/{address}/registered`   → `{"registered": bool}`
//! - `POST /chats/{address}/messages`        → `{"id"?}`
//! - `GET  /chats/{address}`                 → chat, or 404
//! - `GET  /chats/{address}/messages?limit=` → messages, oldest first
//! - `GET  /messages/{id}/media`             → `{"mimetype", "filename"?, "data"}`, or 404

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::channels::client::{
    Chat, ChannelMessage, MediaInfo, OutgoingContent, SentMessage, SessionState, WhatsAppClient,
};
use crate::config::BridgeConfig;
use crate::error::ChannelError;

/// Body of `POST /chats/{address}/messages`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SendBody<'a> {
    Text {
        body: &'a str,
    },
    Media {
        mimetype: &'a str,
        /// Base64-encoded bytes.
        data: String,
        filename: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct RegisteredResponse {
    registered: bool,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    mimetype: String,
    #[serde(default)]
    filename: Option<String>,
}

/// Channel client backed by the bridge's REST API.
pub struct BridgeClient {
    base_url: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl BridgeClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

/// Turn a non-success response into its status and body text.
async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("{status}: {}", body.trim())
}

#[async_trait]
impl WhatsAppClient for BridgeClient {
    async fn session_state(&self) -> Result<SessionState, ChannelError> {
        let resp = self
            .get("/session")
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ChannelError::NotReady {
                reason: error_body(resp).await,
            });
        }

        resp.json::<SessionState>()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))
    }

    async fn is_registered_user(&self, address: &str) -> Result<bool, ChannelError> {
        let resp = self
            .get(&format!("/contacts/{address}/registered"))
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ChannelError::Http(error_body(resp).await));
        }

        let parsed: RegisteredResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;
        Ok(parsed.registered)
    }

    async fn send_message(
        &self,
        address: &str,
        content: OutgoingContent,
    ) -> Result<SentMessage, ChannelError> {
        let body = match content {
            OutgoingContent::Text(ref text) => SendBody::Text { body: text },
            OutgoingContent::Media(ref media) => SendBody::Media {
                mimetype: &media.mime_type,
                data: BASE64.encode(&media.data),
                filename: &media.filename,
            },
        };

        let resp = self
            .post(&format!("/chats/{address}/messages"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed {
                address: address.to_string(),
                reason: error_body(resp).await,
            });
        }

        // Some bridge builds answer 204; treat an unreadable body as "no id".
        Ok(resp.json::<SentMessage>().await.unwrap_or_default())
    }

    async fn get_chat_by_id(&self, address: &str) -> Result<Option<Chat>, ChannelError> {
        let resp = self
            .get(&format!("/chats/{address}"))
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ChannelError::Http(error_body(resp).await));
        }

        resp.json::<Chat>()
            .await
            .map(Some)
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))
    }

    async fn fetch_messages(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChannelError> {
        let resp = self
            .get(&format!("/chats/{address}/messages"))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| ChannelError::FetchFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ChannelError::FetchFailed {
                address: address.to_string(),
                reason: error_body(resp).await,
            });
        }

        resp.json::<Vec<ChannelMessage>>()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))
    }

    async fn download_media(&self, message_id: &str) -> Result<Option<MediaInfo>, ChannelError> {
        let resp = self
            .get(&format!("/messages/{message_id}/media"))
            .send()
            .await
            .map_err(|e| ChannelError::MediaFailed {
                message_id: message_id.to_string(),
                reason: e.to_string(),
            })?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ChannelError::MediaFailed {
                message_id: message_id.to_string(),
                reason: error_body(resp).await,
            });
        }

        let media: MediaResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;
        Ok(Some(MediaInfo {
            mime_type: media.mimetype,
            filename: media.filename.filter(|f| !f.is_empty()),
        }))
    }
}
