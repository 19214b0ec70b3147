use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, Path, State},
    response::Json,
};
use tokio::sync::Mutex;
use tracing::{info, warn, error};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::normalize::read_upload;
use crate::models::{AnalyzeRequest, AnalyzeResponse, SessionResponse};
use crate::services::{require_usable, SlotOutcome, UploadSlot};
use crate::state::AppState;

async fn find_slot(state: &AppState, id: &Uuid) -> AppResult<Arc<Mutex<UploadSlot>>> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::session_not_found(id.to_string()))
}

async fn describe(id: Uuid, slot: &Mutex<UploadSlot>) -> SessionResponse {
    let slot = slot.lock().await;
    SessionResponse::new(id, slot.phase().as_str(), slot.summary())
}

pub async fn create_session_handler(State(state): State<AppState>) -> AppResult<Json<SessionResponse>> {
    let id = state.sessions.create().await?;
    let slot = find_slot(&state, &id).await?;
    Ok(Json(describe(id, &slot).await))
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let slot = find_slot(&state, &id).await?;
    Ok(Json(describe(id, &slot).await))
}

pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    if !state.sessions.remove(&id).await {
        return Err(AppError::session_not_found(id.to_string()));
    }
    Ok(Json(SessionResponse::new(id, "cleared", None)))
}

/// Select a document for the session.
///
/// The slot lock is released while the file is normalized; whichever upload
/// began last is the only one allowed to commit.
pub async fn upload_document_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<SessionResponse>> {
    let slot = find_slot(&state, &id).await?;
    let document = read_upload(&mut multipart, state.config.max_file_size_mb).await?;

    let ticket = slot.lock().await.begin();
    info!(session_id = %id, file_name = %document.name, "Document selected");

    let result = state.normalizer.normalize(&document).await.and_then(require_usable);

    let mut guard = slot.lock().await;
    match result {
        Ok(payload) => match guard.complete(ticket, document, payload) {
            SlotOutcome::Applied => {
                info!(session_id = %id, "Document ready");
                Ok(Json(SessionResponse::new(id, guard.phase().as_str(), guard.summary())))
            }
            SlotOutcome::Stale => {
                warn!(session_id = %id, "Upload finished after being superseded");
                Err(AppError::UploadSuperseded)
            }
        },
        Err(e) => {
            guard.abandon(ticket);
            error!(session_id = %id, error = %e, "Document rejected, keeping previous selection");
            Err(e.into())
        }
    }
}

pub async fn clear_document_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let slot = find_slot(&state, &id).await?;
    let mut guard = slot.lock().await;
    guard.clear();
    info!(session_id = %id, "Document cleared");
    Ok(Json(SessionResponse::new(id, guard.phase().as_str(), None)))
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnalyzeRequest>,
) -> AppResult<Json<AnalyzeResponse>> {
    let start = Instant::now();
    let slot = find_slot(&state, &id).await?;

    let request = {
        let guard = slot.lock().await;
        body.to_analysis_request(guard.payload())?
    };

    if !state.analysis.is_configured() {
        return Err(AppError::service_unavailable("analysis backend"));
    }

    let result = state.analysis.analyze(request).await.map_err(|e| {
        error!(session_id = %id, error = %e, "Analysis failed");
        AppError::from(e)
    })?;

    let total_time = start.elapsed().as_millis() as u64;
    info!(
        session_id = %id,
        overall_score = result.overall_score,
        total_time_ms = total_time,
        "Analysis completed"
    );

    Ok(Json(AnalyzeResponse::new(result, total_time)))
}
