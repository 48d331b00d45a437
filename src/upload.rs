use std::path::{Path, PathBuf};

/// Reduces an untrusted client filename to something safe to join onto the
/// uploads directory: only the final path component survives, every character
/// outside ASCII `[A-Za-z0-9._-]` becomes `_`, and leading dots are stripped
/// so the result can never be a dotfile or a parent reference.
///
/// Returns an empty string when nothing usable remains; callers must treat
/// that as a rejected filename. Sanitizing twice yields the same result as
/// sanitizing once.
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Writes the uploaded bytes to `<dir>/<filename>`, creating the directory if
/// needed and overwriting any previous upload of the same name.
pub async fn store_upload(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, bytes).await?;
    tracing::debug!(?path, len = bytes.len(), "stored upload");
    Ok(path)
}
