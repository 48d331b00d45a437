use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Runtime configuration. Every field has a default so the service can start
/// with no config file at all; a JSON file overrides individual fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
    /// Where uploaded images are written. Must live under `static_dir` for
    /// the result page to be able to reference them.
    pub upload_dir: PathBuf,
    /// Root under which per-request `result_<stem>` directories are created.
    pub result_dir: PathBuf,
    pub model_path: PathBuf,
    /// Class names, one per line, line number = class id. Optional.
    pub labels_path: PathBuf,
    /// Confidence threshold passed to the detector.
    pub confidence: f32,
    /// Upper bound on a single model invocation.
    pub model_timeout_secs: u64,
    /// Maximum accepted request body, in bytes.
    pub body_limit_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: PathBuf::from("static"),
            upload_dir: PathBuf::from("static/uploads"),
            result_dir: PathBuf::from("static/results"),
            model_path: PathBuf::from("models/best.onnx"),
            labels_path: PathBuf::from("models/labels.txt"),
            confidence: 0.25,
            model_timeout_secs: 30,
            body_limit_bytes: 25 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
