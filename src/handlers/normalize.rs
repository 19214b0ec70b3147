use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    response::Json,
};
use std::time::Instant;
use tracing::{info, warn, debug, error};

use crate::error::{AppError, AppResult};
use crate::models::{NormalizeResponse, UploadedDocument};
use crate::services::require_usable;
use crate::state::AppState;

const FILE_NAME_HEADER: &str = "x-file-name";

pub async fn normalize_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<NormalizeResponse>> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

    info!(request_id = %request_id, "Starting normalization request");

    let document = match read_upload(&mut multipart, state.config.max_file_size_mb).await {
        Ok(document) => {
            info!(
                request_id = %request_id,
                file_name = %document.name,
                file_size = document.size(),
                media_type = %document.declared_media_type,
                "File extracted from multipart form"
            );
            document
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to extract file from multipart");
            return Err(e);
        }
    };

    respond(&state, &request_id, document, start).await
}

/// Direct binary upload: the body is the file, `Content-Type` its media type.
/// Without a usable media type the `x-file-name` suffix decides the strategy.
pub async fn normalize_binary_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<Json<NormalizeResponse>> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

    info!(request_id = %request_id, "Starting binary normalization request");

    let content_type = headers
        .get("content-type")
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("")
        .trim();

    if content_type.is_empty() {
        debug!(request_id = %request_id, "Binary upload without content type, classifying by file name");
    }

    if body.is_empty() {
        warn!(request_id = %request_id, "Empty body received");
        return Err(AppError::MissingFile);
    }

    check_size(body.len(), state.config.max_file_size_mb)?;

    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|name| name.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
        .to_string();

    let document = UploadedDocument::new(file_name, content_type, body);
    respond(&state, &request_id, document, start).await
}

async fn respond(
    state: &AppState,
    request_id: &str,
    document: UploadedDocument,
    start: Instant,
) -> AppResult<Json<NormalizeResponse>> {
    let payload = match state.normalizer.normalize(&document).await.and_then(require_usable) {
        Ok(payload) => payload,
        Err(e) => {
            error!(request_id = %request_id, file_name = %document.name, error = %e, "Normalization failed");
            return Err(e.into());
        }
    };

    let total_time = start.elapsed().as_millis() as u64;

    info!(
        request_id = %request_id,
        strategy = %payload.strategy,
        text_length = payload.extracted_text.len(),
        total_time_ms = total_time,
        "Request completed successfully"
    );

    Ok(Json(NormalizeResponse::new(&document, payload, total_time)))
}

/// Pull the `file` field out of a multipart form.
pub(crate) async fn read_upload(multipart: &mut Multipart, max_file_size_mb: usize) -> AppResult<UploadedDocument> {
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::InvalidFile {
        message: format!("Failed to read multipart field: {}", e),
    })? {
        if field.name().unwrap_or("") != "file" {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();

        let data = field.bytes().await.map_err(|e| AppError::InvalidFile {
            message: format!("Failed to read file data: {}", e),
        })?;

        if data.is_empty() {
            return Err(AppError::InvalidFile {
                message: "File is empty".to_string(),
            });
        }

        check_size(data.len(), max_file_size_mb)?;

        debug!(
            "Extracted file: {} ({} bytes, type: {:?})",
            file_name,
            data.len(),
            content_type
        );

        return Ok(UploadedDocument::new(file_name, content_type, data));
    }

    Err(AppError::MissingFile)
}

fn check_size(size: usize, max_file_size_mb: usize) -> AppResult<()> {
    let max_size_bytes = max_file_size_mb * 1024 * 1024;
    if size > max_size_bytes {
        warn!(file_size = size, max_size = max_size_bytes, "File size exceeds limit");
        return Err(AppError::FileTooLarge {
            size: size.div_ceil(1024 * 1024),
            limit: max_file_size_mb,
        });
    }
    Ok(())
}
