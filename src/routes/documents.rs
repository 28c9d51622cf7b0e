use std::io::SeekFrom;

use axum::extract::multipart::Field;
use axum::extract::{Json, Multipart, Path, Query, State};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::pipeline::{
    self, DeleteMode, DocumentAccess, IncomingFile, UploadReceipt, UploadRequest,
};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct DeleteDocumentQuery {
    #[serde(default)]
    pub purge: bool,
}

#[derive(Serialize)]
pub struct DeleteDocumentResponse {
    pub document_id: Uuid,
    pub message: &'static str,
}

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadReceipt>> {
    let mut advocate_id: Option<String> = None;
    let mut case_id: Option<String> = None;
    let mut doc_type: Option<String> = None;
    let mut file: Option<IncomingFile<File>> = None;
    let spool_cap = state.policy.max_file_size().saturating_add(1);

    while let Some(mut field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::invalid_input(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let declared_name = field.file_name().map(|n| n.to_string()).ok_or_else(|| {
                    AppError::invalid_input("file part must carry a filename")
                })?;
                let content_type = field.content_type().map(|mime| mime.to_string());
                let body = spool_field(&mut field, spool_cap).await?;
                file = Some(IncomingFile {
                    declared_name,
                    content_type,
                    body,
                });
            }
            Some("advocate_id") | Some("adv_id") => advocate_id = Some(read_text(field).await?),
            Some("case_id") => case_id = Some(read_text(field).await?),
            Some("doc_type") | Some("file_type") => doc_type = Some(read_text(field).await?),
            _ => {}
        }
    }

    let request = UploadRequest {
        advocate_id: advocate_id.ok_or_else(|| missing("advocate_id"))?,
        case_id: case_id.ok_or_else(|| missing("case_id"))?,
        doc_type: doc_type.ok_or_else(|| missing("doc_type"))?,
        file: file.ok_or_else(|| missing("file"))?,
    };

    let receipt = pipeline::upload_document(&state, request).await?;
    Ok(Json(receipt))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> AppResult<Json<DocumentAccess>> {
    Ok(Json(pipeline::get_file(&state, &document_id).await?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<DeleteDocumentQuery>,
) -> AppResult<Json<DeleteDocumentResponse>> {
    let mode = if query.purge {
        DeleteMode::Hard
    } else {
        DeleteMode::Soft
    };
    let document_id = pipeline::delete_file(&state, &document_id, mode).await?;
    info!(document_id = %document_id, purge = query.purge, "delete request completed");
    Ok(Json(DeleteDocumentResponse {
        document_id,
        message: "File deleted successfully",
    }))
}

fn missing(field: &str) -> AppError {
    warn!(field, "upload rejected: missing form field");
    AppError::invalid_input(format!("{field} field is required"))
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|err| AppError::invalid_input(format!("invalid form field: {err}")))
}

/// Copies the file part into an anonymous temp file, keeping at most `cap`
/// bytes. Whatever follows is left for the multipart reader to skip; the
/// size check downstream sees the truncated spool exceed the limit.
async fn spool_field(field: &mut Field<'_>, cap: u64) -> AppResult<File> {
    let mut spool = File::from_std(tempfile::tempfile()?);
    let mut kept: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(|err| {
        error!(error = %err, "failed to read file bytes");
        AppError::invalid_input(format!("failed to read file bytes: {err}"))
    })? {
        let room = cap - kept;
        let take = (chunk.len() as u64).min(room) as usize;
        spool.write_all(&chunk[..take]).await?;
        kept += take as u64;
        if kept >= cap {
            break;
        }
    }

    spool.flush().await?;
    spool.seek(SeekFrom::Start(0)).await?;
    Ok(spool)
}
