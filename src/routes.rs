use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::artifacts::{find_annotated_image, static_url_path};
use crate::config::AppConfig;
use crate::detector::{Detector, PredictRequest};
use crate::error::AppError;
use crate::render;
use crate::summary::{summarize, Notice};
use crate::upload::{sanitize_filename, store_upload};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub detector: Arc<dyn Detector>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(render::index_page())
}

/// The whole request pipeline: store the upload, run the detector against it,
/// aggregate the detections, locate the annotated image, and render the page.
async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let (raw_filename, data) = read_file_field(&mut multipart).await?;
    if raw_filename.is_empty() {
        return Err(AppError::EmptyFilename);
    }
    let filename = sanitize_filename(&raw_filename);
    if filename.is_empty() {
        return Err(AppError::EmptyFilename);
    }

    let filepath = store_upload(&state.config.upload_dir, &filename, &data).await?;

    // stem is non-empty because the sanitized filename is
    let stem = Path::new(&filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.clone());
    let result_name = format!("result_{stem}");

    let request = PredictRequest {
        source: filepath.clone(),
        conf: state.config.confidence,
        save: true,
        project: state.config.result_dir.clone(),
        name: result_name.clone(),
    };
    let detector = state.detector.clone();
    let results = tokio::time::timeout(
        Duration::from_secs(state.config.model_timeout_secs),
        tokio::task::spawn_blocking(move || detector.predict(&request)),
    )
    .await
    .map_err(|_| AppError::ModelTimeout)?
    .map_err(|err| AppError::Internal(format!("detection task failed: {err}")))??;

    let mut summary = summarize(&results, state.detector.names());

    // Only look for the annotated copy when something was detected; otherwise
    // the original upload is the right thing to show.
    let mut display = filepath.clone();
    if summary.has_detections() {
        let result_dir = state.config.result_dir.join(&result_name);
        match find_annotated_image(&result_dir) {
            Some(annotated) => display = annotated,
            None => summary.notices.push(Notice::AnnotatedMissing),
        }
    }

    let img_path = static_url_path(&display, &state.config.static_dir, &filepath);
    info!(
        %filename,
        detections = summary.predictions.len(),
        %img_path,
        "prediction complete"
    );

    Ok(Html(render::result_page(&summary, &img_path)))
}

/// Pulls the "file" field out of the multipart form. Absent field is
/// `MissingFile`; the filename (possibly empty) is validated by the caller.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Multipart(err.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|err| AppError::Multipart(err.to_string()))?;
            return Ok((filename, data));
        }
    }
    Err(AppError::MissingFile)
}
