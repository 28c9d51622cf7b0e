//! Upload pipeline.
//!
//! An upload moves through `Validated -> PermissionChecked -> BlobWritten ->
//! MetadataCommitted`. Each stage is a value that can only be produced by
//! the one before it, so the blob is always written before its metadata row
//! exists and a failed commit always passes through the compensating delete.

use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::NewDocument;
use crate::reconcile::record_orphaned_blob;
use crate::registry::{find_advocate, find_case, is_advocate_on_case};
use crate::schema::documents;
use crate::state::AppState;
use crate::storage::document_key;
use crate::validation::{parse_id, FileDescriptor};

/// The file part of an upload. `body` must be rewindable because the size
/// check reads it once before it is stored.
pub struct IncomingFile<R> {
    pub declared_name: String,
    pub content_type: Option<String>,
    pub body: R,
}

pub struct UploadRequest<R> {
    pub advocate_id: String,
    pub case_id: String,
    pub doc_type: String,
    pub file: IncomingFile<R>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub document_id: Uuid,
    pub url: String,
    pub file_name: String,
    pub s3_key: String,
    pub file_size: i64,
    pub doc_type: String,
}

struct Validated {
    advocate_id: Uuid,
    case_id: Uuid,
}

struct PermissionChecked {
    advocate_id: Uuid,
    case_id: Uuid,
}

struct BlobWritten {
    document: NewDocument,
}

pub async fn upload_document<R>(state: &AppState, request: UploadRequest<R>) -> AppResult<UploadReceipt>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
{
    let UploadRequest {
        advocate_id,
        case_id,
        doc_type,
        mut file,
    } = request;

    let validated = validate_ids(&advocate_id, &case_id)?;
    let checked = check_permission(state, validated)?;

    let descriptor = state
        .policy
        .inspect(
            &file.declared_name,
            file.content_type.as_deref(),
            &doc_type,
            &mut file.body,
        )
        .await
        .map_err(|err| {
            warn!(
                advocate_id = %checked.advocate_id,
                case_id = %checked.case_id,
                error = %err,
                "upload rejected by validation"
            );
            AppError::from(err)
        })?;

    let mut bytes = Vec::with_capacity(descriptor.size as usize);
    file.body.read_to_end(&mut bytes).await?;
    if bytes.len() as u64 != descriptor.size {
        return Err(AppError::invalid_input(
            "uploaded file changed while it was being read",
        ));
    }

    let written = write_blob(state, checked, descriptor, bytes).await?;
    let key = written.document.s3_key.clone();

    match commit_metadata(state, &written) {
        Ok(()) => {
            let document = written.document;
            info!(
                document_id = %document.id,
                advocate_id = %document.advocate_id,
                case_id = %document.case_id,
                key = %document.s3_key,
                file_size = document.file_size,
                "document upload succeeded"
            );
            Ok(UploadReceipt {
                document_id: document.id,
                url: document.file_path,
                file_name: document.file_name,
                s3_key: document.s3_key,
                file_size: document.file_size,
                doc_type: document.doc_type,
            })
        }
        Err(err) => {
            error!(key = %key, error = %err, "failed to save document record");
            discard_uncommitted_blob(state, &key, &err).await;
            Err(err)
        }
    }
}

fn validate_ids(advocate_id: &str, case_id: &str) -> AppResult<Validated> {
    Ok(Validated {
        advocate_id: parse_id("advocate_id", advocate_id)?,
        case_id: parse_id("case_id", case_id)?,
    })
}

fn check_permission(state: &AppState, validated: Validated) -> AppResult<PermissionChecked> {
    let Validated {
        advocate_id,
        case_id,
    } = validated;
    let mut conn = state.db()?;

    find_advocate(&mut conn, advocate_id)?;
    find_case(&mut conn, case_id)?;

    if !is_advocate_on_case(&mut conn, advocate_id, case_id)? {
        warn!(
            advocate_id = %advocate_id,
            case_id = %case_id,
            "upload rejected: advocate not associated with case"
        );
        return Err(AppError::forbidden(
            "Advocate does not have permission for this case",
        ));
    }

    Ok(PermissionChecked {
        advocate_id,
        case_id,
    })
}

async fn write_blob(
    state: &AppState,
    checked: PermissionChecked,
    descriptor: FileDescriptor,
    bytes: Vec<u8>,
) -> AppResult<BlobWritten> {
    let key = document_key(
        checked.advocate_id,
        checked.case_id,
        &descriptor.doc_type,
        &descriptor.file_name,
    );

    let receipt = state
        .storage
        .put_object(&key, bytes, Some(descriptor.content_type.clone()))
        .await
        .map_err(|err| {
            error!(key = %key, error = %err, "failed to upload file to storage");
            AppError::storage("failed to upload file to storage", err)
        })?;

    Ok(BlobWritten {
        document: NewDocument {
            id: Uuid::new_v4(),
            doc_type: descriptor.doc_type,
            file_name: descriptor.file_name,
            file_path: receipt.url,
            s3_key: key,
            file_size: descriptor.size as i64,
            content_type: Some(descriptor.content_type),
            version_id: receipt.version_id,
            advocate_id: checked.advocate_id,
            case_id: checked.case_id,
        },
    })
}

fn commit_metadata(state: &AppState, written: &BlobWritten) -> AppResult<()> {
    let mut conn = state.db()?;
    insert_document(&mut conn, &written.document)
}

fn insert_document(conn: &mut PgConnection, document: &NewDocument) -> AppResult<()> {
    conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(documents::table)
            .values(document)
            .execute(conn)?;
        Ok(())
    })
}

/// Best-effort removal of a blob whose metadata never committed. A failed
/// delete is recorded for the reconciliation sweep; neither outcome changes
/// the error reported for the upload.
async fn discard_uncommitted_blob(state: &AppState, key: &str, cause: &AppError) {
    match state.storage.delete_object(key).await {
        Ok(()) => {
            warn!(key = %key, cause = %cause, "removed blob after failed metadata commit");
        }
        Err(delete_err) => {
            error!(
                key = %key,
                cause = %cause,
                error = %delete_err,
                "failed to remove blob after failed metadata commit"
            );
            let reason = format!("metadata commit failed: {cause}; cleanup failed: {delete_err}");
            let recorded = state
                .db()
                .and_then(|mut conn| record_orphaned_blob(&mut conn, key, &reason));
            if let Err(record_err) = recorded {
                error!(
                    key = %key,
                    error = %record_err,
                    "failed to record orphaned blob for reconciliation"
                );
            }
        }
    }
}
