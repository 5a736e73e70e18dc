//! Request handlers for the upload page and the JSON API.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info_span, warn};
use uuid::Uuid;

use crate::audio::encode_wav;
use crate::enhancement::{EnhancementError, SpeechEnhancer};
use crate::pipeline::{process_upload, EnhancementResult, ProcessError, UploadedFile};
use crate::validation::allowed_file;

use super::page;
use super::server::AppState;
use super::types::{EnhanceResponse, ErrorResponse, HealthResponse};

/// Multipart field carrying the uploaded file
const FILE_FIELD: &str = "file";

/// `GET /` - idle page with the uploader
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(page::render_index(&state.model_name))
}

/// `POST /enhance` - form upload, rendered as a page
pub async fn enhance_page(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return Html(page::render_index(&state.model_name)).into_response(),
        Err(e) => {
            warn!("Malformed upload: {}", e);
            return (
                e.status(),
                Html(page::render_error(&state.model_name, &e.body_text())),
            )
                .into_response();
        }
    };

    match run_pipeline(&state, upload).await {
        Ok(result) => match page::render_result(&state.model_name, &result) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("Failed to encode playback audio: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(page::render_error(&state.model_name, &e.to_string())),
                )
                    .into_response()
            }
        },
        Err(e) if e.is_warning() => {
            Html(page::render_warning(&state.model_name, &e.to_string())).into_response()
        }
        Err(e) => Html(page::render_error(&state.model_name, &e.to_string())).into_response(),
    }
}

/// `POST /api/enhance` - upload returning base64 WAV files as JSON
pub async fn enhance_api(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "missing_file",
                    format!("Missing multipart field '{}'", FILE_FIELD),
                )),
            )
                .into_response()
        }
        Err(e) => {
            return (
                e.status(),
                Json(ErrorResponse::new("malformed_upload", e.body_text())),
            )
                .into_response()
        }
    };

    let result = match run_pipeline(&state, upload).await {
        Ok(result) => result,
        Err(e) => {
            let status = match e {
                ProcessError::Enhancement(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            return (status, Json(ErrorResponse::new(e.kind(), e.to_string()))).into_response();
        }
    };

    let encoded = encode_wav(&result.original).and_then(|original| {
        encode_wav(&result.enhanced).map(|enhanced| (original, enhanced))
    });
    match encoded {
        Ok((original, enhanced)) => Json(EnhanceResponse {
            model: state.model_name.to_string(),
            sample_rate: result.enhanced.sample_rate,
            source_sample_rate: result.source_sample_rate,
            duration_secs: result.original.duration_secs(),
            processing_ms: result.processing_ms,
            original_wav_base64: STANDARD.encode(original),
            enhanced_wav_base64: STANDARD.encode(enhanced),
        })
        .into_response(),
        Err(e) => {
            error!("Failed to encode playback audio: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("encode", e.to_string())),
            )
                .into_response()
        }
    }
}

/// `GET /health`
///
/// Unhealthy while the enhancer lock is poisoned. A panicked request clears
/// the poison before it answers, so this recovers with it.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: !state.enhancer.is_poisoned(),
        model: state.model_name.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Pull the `file` field out of a multipart body
async fn read_upload(mut multipart: Multipart) -> Result<Option<UploadedFile>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(Some(UploadedFile::new(filename, bytes.to_vec())));
    }
    Ok(None)
}

/// Run the blocking pipeline for one upload under the shared enhancer
async fn run_pipeline(
    state: &AppState,
    upload: UploadedFile,
) -> Result<EnhancementResult, ProcessError> {
    // Rejected uploads never wait for the model
    if !allowed_file(&upload.filename) {
        warn!("Rejected upload with invalid file type: {}", upload.filename);
        return Err(ProcessError::InvalidFileType);
    }

    let enhancer = state.enhancer.clone();
    let policy = state.sample_rate_policy;
    let span = info_span!("upload", request_id = %Uuid::new_v4(), filename = %upload.filename);

    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let mut enhancer = lock_enhancer(&enhancer);
        process_upload(&upload, &mut enhancer, policy)
    })
    .await
    .unwrap_or_else(|e| {
        error!("Enhancement task failed: {}", e);
        // Keep serving after a panicked inference
        state.enhancer.clear_poison();
        Err(ProcessError::Enhancement(EnhancementError::InferenceError(
            "enhancement task did not complete".to_string(),
        )))
    })
}

/// Lock the shared enhancer, recovering from a panic in an earlier request
fn lock_enhancer(enhancer: &Mutex<SpeechEnhancer>) -> MutexGuard<'_, SpeechEnhancer> {
    enhancer.lock().unwrap_or_else(|poisoned| {
        warn!("Recovering enhancer after a failed request");
        enhancer.clear_poison();
        poisoned.into_inner()
    })
}
