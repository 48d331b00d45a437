use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Extensions the detector is known to write annotated images with.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Fallback shown when not even the original upload path resolves.
pub const PLACEHOLDER_IMAGE: &str = "uploads/default_image.jpg";

/// Finds the first image-like file in the per-request results directory.
/// A missing directory or an empty scan is not an error; the caller falls back
/// to the original upload.
pub fn find_annotated_image(result_dir: &Path) -> Option<PathBuf> {
    if !result_dir.exists() {
        warn!(?result_dir, "expected result directory does not exist");
        return None;
    }
    let entries = match std::fs::read_dir(result_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(?result_dir, %err, "could not read result directory");
            return None;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if has_image_extension(&path) {
            debug!(?path, "found annotated image");
            return Some(path);
        }
    }
    warn!(?result_dir, "no annotated image in result directory");
    None
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Rewrites an artifact path as a `/`-separated path relative to the static
/// root, for the result page's `img src`. Never fails: falls back to the
/// upload path, then to a placeholder.
pub fn static_url_path(artifact: &Path, static_root: &Path, upload: &Path) -> String {
    if let Some(rel) = relative_to(artifact, static_root) {
        return rel;
    }
    warn!(?artifact, ?static_root, "artifact not under static root, using upload path");
    if let Some(rel) = relative_to(upload, static_root) {
        return rel;
    }
    warn!(?upload, ?static_root, "upload path not under static root, using placeholder");
    PLACEHOLDER_IMAGE.to_string()
}

fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_directory_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_annotated_image(&dir.path().join("result_x")).is_none());
    }

    #[test]
    fn skips_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("labels.txt"), "x").unwrap();
        fs::write(dir.path().join("run.json"), "{}").unwrap();
        assert!(find_annotated_image(dir.path()).is_none());
    }

    #[test]
    fn finds_image_with_uppercase_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("SCAN.JPG"), "x").unwrap();
        let found = find_annotated_image(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "SCAN.JPG");
    }

    #[test]
    fn resolves_path_under_static_root() {
        let rel = static_url_path(
            Path::new("static/results/result_scan/scan.jpg"),
            Path::new("static"),
            Path::new("static/uploads/scan.jpg"),
        );
        assert_eq!(rel, "results/result_scan/scan.jpg");
    }

    #[test]
    fn falls_back_to_upload_path() {
        let rel = static_url_path(
            Path::new("/elsewhere/scan.jpg"),
            Path::new("static"),
            Path::new("static/uploads/scan.jpg"),
        );
        assert_eq!(rel, "uploads/scan.jpg");
    }

    #[test]
    fn falls_back_to_placeholder_last() {
        let rel = static_url_path(
            Path::new("/elsewhere/scan.jpg"),
            Path::new("static"),
            Path::new("/also/elsewhere/scan.jpg"),
        );
        assert_eq!(rel, PLACEHOLDER_IMAGE);
    }
}
