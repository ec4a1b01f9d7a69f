//! REST endpoints: `/send-message`, `/get-messages`, `/health`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::staging::{safe_file_name, stage_upload};
use crate::channels::client::MediaPayload;
use crate::error::{Error, RelayError, ValidationError};
use crate::relay::history::format_timestamp;
use crate::relay::{DeliveryState, Direction, HistoryEntry, RelayService, SendReport, SendRequest};

/// Shared state for the relay routes.
#[derive(Clone)]
pub struct ApiState {
    pub relay: Arc<RelayService>,
    pub upload_dir: PathBuf,
    pub date_format: String,
}

/// Build the relay REST routes.
pub fn relay_routes(state: ApiState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/send-message", post(send_message))
        .route("/get-messages", post(get_messages))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Maps relay errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            Error::Validation(ValidationError::UploadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Relay(RelayError::NotRegistered { .. }) => StatusCode::BAD_REQUEST,
            Error::Relay(RelayError::ChatNotFound { .. } | RelayError::NoMessages { .. }) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let message = match self.0 {
            Error::Validation(ref e) => e.to_string(),
            Error::Relay(ref e) => e.to_string(),
            ref other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "wa-relay"
    }))
}

// ── Send ────────────────────────────────────────────────────────────────

/// Fields of the `/send-message` multipart form.
#[derive(Debug, Default)]
struct SendForm {
    number: Option<String>,
    message: Option<String>,
    file: Option<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

async fn read_send_form(mut multipart: Multipart) -> Result<SendForm, ApiError> {
    let mut form = SendForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("number") => form.number = Some(field.text().await.map_err(bad_multipart)?),
            Some("message") => form.message = Some(field.text().await.map_err(bad_multipart)?),
            Some("file") => {
                let name = field.file_name().unwrap_or("attachment").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?.to_vec();
                form.file = Some(UploadedFile {
                    name,
                    mime_type,
                    bytes,
                });
            }
            other => warn!(field = ?other, "Ignoring unexpected form field"),
        }
    }

    Ok(form)
}

fn bad_multipart(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %err, "Upload exceeds body limit");
        return ValidationError::UploadTooLarge.into();
    }
    warn!(error = %err, "Malformed multipart body");
    ValidationError::MissingFields.into()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmationDetails {
    text_confirmado: bool,
    arquivo_confirmado: bool,
    variantes: Vec<String>,
}

/// POST /send-message
///
/// Multipart `number`, `message`, `file`. Runs dispatch and confirmation to
/// completion, even if the caller hangs up.
async fn send_message(State(state): State<ApiState>, multipart: Multipart) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("send_message", %request_id);

    async move {
        let form = match read_send_form(multipart).await {
            Ok(form) => form,
            Err(e) => return e.into_response(),
        };

        let attachment = form.file.map(|f| MediaPayload {
            mime_type: f.mime_type,
            filename: safe_file_name(&f.name),
            data: f.bytes,
        });
        let request = match SendRequest::from_parts(form.number, form.message, attachment) {
            Ok(request) => request,
            Err(e) => return ApiError::from(e).into_response(),
        };

        let staged = stage_upload(
            &state.upload_dir,
            &request.attachment.filename,
            &request.attachment.data,
        )
        .await;
        if let Err(e) = staged {
            return ApiError::from(Error::from(e)).into_response();
        }

        // Detached so a dropped connection doesn't abort a half-sent request.
        let relay = Arc::clone(&state.relay);
        let task = tokio::spawn(
            async move { relay.send(&request).await }.instrument(tracing::Span::current()),
        );

        match task.await {
            Ok(Ok(report)) => send_response(&report),
            Ok(Err(e)) => ApiError::from(e).into_response(),
            Err(e) => {
                error!(error = %e, "Send task panicked");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}

fn send_response(report: &SendReport) -> Response {
    match report.ensure_confirmed() {
        Ok(()) => {
            info!(attempts = report.confirmation.attempts_used, "Message and file confirmed");
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Message and file sent and confirmed",
                })),
            )
                .into_response()
        }
        Err(e) => {
            let details = ConfirmationDetails {
                text_confirmado: report.confirmation.text_confirmed,
                arquivo_confirmado: report.confirmation.file_confirmed,
                variantes: report.variants.iter().map(|v| v.digits.clone()).collect(),
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "detalhes": details,
                })),
            )
                .into_response()
        }
    }
}

// ── History ─────────────────────────────────────────────────────────────

/// `number` from a `/get-messages` body. Numeric values are taken as digits;
/// anything else counts as missing.
fn requested_number(body: &Value) -> Option<String> {
    match body.get("number")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One row of `/get-messages`.
#[derive(Debug, Serialize)]
struct HistoryRow {
    number: String,
    message: String,
    date: String,
    status: &'static str,
    state: &'static str,
}

impl HistoryRow {
    fn new(number: &str, entry: &HistoryEntry, date_format: &str) -> Self {
        Self {
            number: number.to_string(),
            message: entry.summary.clone(),
            date: format_timestamp(entry.timestamp, date_format),
            status: match entry.direction {
                Direction::Sent => "Enviado",
                Direction::Received => "Recebido",
            },
            state: match entry.delivery_state {
                DeliveryState::Received => "Recebido",
                other => other.label(),
            },
        }
    }
}

/// POST /get-messages
///
/// JSON `{number}`. Returns the recent conversation, oldest first. A missing
/// or unreadable body is treated as a missing number.
async fn get_messages(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<HistoryRow>>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("get_messages", %request_id);

    async move {
        let requested = match body {
            Ok(Json(ref value)) => requested_number(value),
            Err(rejection) => {
                warn!(error = %rejection, "Unreadable get-messages body");
                None
            }
        };
        let entries = state.relay.read_history(requested.as_deref()).await?;
        let number = requested.as_deref().unwrap_or_default().trim();
        let rows: Vec<HistoryRow> = entries
            .iter()
            .map(|entry| HistoryRow::new(number, entry, &state.date_format))
            .collect();
        Ok::<_, ApiError>(Json(rows))
    }
    .instrument(span)
    .await
}
