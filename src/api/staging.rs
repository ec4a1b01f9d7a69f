//! Upload staging: attachments land on disk under their original base name
//! before dispatch.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RelayError;

/// Strip any directory components a client put in the filename.
pub fn safe_file_name(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match name {
        "" | "." | ".." => "attachment".to_string(),
        other => other.to_string(),
    }
}

/// Write `bytes` to `<dir>/<safe name>`, replacing any previous upload with
/// the same name. Returns the staged path.
pub async fn stage_upload(dir: &Path, original_name: &str, bytes: &[u8]) -> Result<PathBuf, RelayError> {
    let name = safe_file_name(original_name);
    let staging_err = |source| RelayError::Staging {
        name: name.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(staging_err)?;
    let path = dir.join(&name);
    tokio::fs::write(&path, bytes).await.map_err(staging_err)?;

    debug!(path = %path.display(), bytes = bytes.len(), "Staged upload");
    Ok(path)
}
