//! relay-send: post a message and file to a running wa-relay.
//!
//! ```sh
//! relay-send --number 5585999998888 --message "Segue o boleto" ./BOLETO.pdf
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use reqwest::multipart::{Form, Part};

#[derive(Debug, Parser)]
#[command(name = "relay-send", version, about = "Send a message and file through wa-relay")]
struct Cli {
    /// Base URL of the relay.
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Destination number (formatting is ignored).
    #[arg(long)]
    number: String,

    /// Text sent before the file.
    #[arg(long)]
    message: String,

    /// File to attach.
    file: PathBuf,
}

/// Best-effort MIME type from the file extension.
fn mime_from_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
        .as_str()
    {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "ogg" | "opus" => "audio/ogg",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let bytes = tokio::fs::read(&cli.file)
        .await
        .with_context(|| format!("reading {}", cli.file.display()))?;
    let file_name = cli
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_from_path(&cli.file))?;
    let form = Form::new()
        .text("number", cli.number)
        .text("message", cli.message)
        .part("file", part);

    let url = format!("{}/send-message", cli.url.trim_end_matches('/'));
    let resp = reqwest::Client::new()
        .post(&url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("posting to {url}"))?;

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        anyhow::bail!("relay answered {status}");
    }
    Ok(())
}
