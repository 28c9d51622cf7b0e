use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::{find_live_document, to_iso};
use crate::error::{AppError, AppResult};
use crate::models::{Document, NewDocumentTombstone};
use crate::reconcile::record_orphaned_blob;
use crate::registry::find_case;
use crate::schema::{document_tombstones, documents};
use crate::state::AppState;
use crate::validation::parse_id;

#[derive(Debug, Serialize)]
pub struct DocumentAccess {
    pub document_id: Uuid,
    pub file_name: String,
    pub doc_type: String,
    pub presigned_url: String,
    pub expires_in: u64,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub uploaded_at: String,
    pub case_id: Uuid,
    pub advocate_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub file_name: String,
    pub doc_type: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub uploaded_at: String,
    pub advocate_id: Uuid,
}

impl From<Document> for DocumentSummary {
    fn from(doc: Document) -> Self {
        Self {
            document_id: doc.id,
            file_name: doc.file_name,
            doc_type: doc.doc_type,
            file_size: doc.file_size,
            content_type: doc.content_type,
            uploaded_at: to_iso(doc.created_at),
            advocate_id: doc.advocate_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Tombstone the record and keep the row for history.
    #[default]
    Soft,
    /// Remove the row entirely.
    Hard,
}

/// Issues a fresh presigned URL for a live document. URLs are never cached.
pub async fn get_file(state: &AppState, raw_id: &str) -> AppResult<DocumentAccess> {
    let document_id = parse_id("file_id", raw_id)?;
    let doc = {
        let mut conn = state.db()?;
        find_live_document(&mut conn, document_id)?
    };

    let ttl = state.presigned_url_ttl();
    let presigned_url = state
        .storage
        .presign_get_object(&doc.s3_key, ttl)
        .await
        .map_err(|err| {
            error!(document_id = %doc.id, error = %err, "failed to generate presigned URL");
            AppError::storage("Could not generate access URL", err)
        })?;

    Ok(DocumentAccess {
        document_id: doc.id,
        file_name: doc.file_name,
        doc_type: doc.doc_type,
        presigned_url,
        expires_in: ttl.as_secs(),
        file_size: doc.file_size,
        content_type: doc.content_type,
        uploaded_at: to_iso(doc.created_at),
        case_id: doc.case_id,
        advocate_id: doc.advocate_id,
    })
}

/// Deletes the blob first; the record is only retired once the blob is gone.
pub async fn delete_file(state: &AppState, raw_id: &str, mode: DeleteMode) -> AppResult<Uuid> {
    let document_id = parse_id("file_id", raw_id)?;
    let doc = {
        let mut conn = state.db()?;
        find_live_document(&mut conn, document_id)?
    };

    state
        .storage
        .delete_object(&doc.s3_key)
        .await
        .map_err(|err| {
            error!(document_id = %doc.id, key = %doc.s3_key, error = %err, "failed to delete file from storage");
            AppError::storage("Failed to delete file from storage", err)
        })?;

    let retired = state.db().and_then(|mut conn| retire_document(&mut conn, doc.id, mode));
    if let Err(err) = &retired {
        error!(
            document_id = %doc.id,
            key = %doc.s3_key,
            error = %err,
            "blob deleted but document record was not retired"
        );
        let reason = format!("blob deleted but record not retired: {err}");
        let recorded = state
            .db()
            .and_then(|mut conn| record_orphaned_blob(&mut conn, &doc.s3_key, &reason));
        if let Err(record_err) = recorded {
            error!(
                document_id = %doc.id,
                key = %doc.s3_key,
                error = %record_err,
                "failed to record dangling document for reconciliation"
            );
        }
    }
    retired?;

    info!(document_id = %doc.id, mode = ?mode, "document deleted");
    Ok(doc.id)
}

fn retire_document(conn: &mut PgConnection, document_id: Uuid, mode: DeleteMode) -> AppResult<()> {
    let affected = conn.transaction::<_, AppError, _>(|conn| match mode {
        DeleteMode::Soft => Ok(diesel::insert_into(document_tombstones::table)
            .values(&NewDocumentTombstone { document_id })
            .on_conflict_do_nothing()
            .execute(conn)?),
        DeleteMode::Hard => Ok(diesel::delete(documents::table.find(document_id)).execute(conn)?),
    })?;

    if affected == 0 {
        return Err(AppError::not_found("File not found"));
    }
    Ok(())
}

/// Live documents of a case, newest first.
pub fn list_case_documents(state: &AppState, raw_case_id: &str) -> AppResult<Vec<DocumentSummary>> {
    let case_id = parse_id("case_id", raw_case_id)?;
    let mut conn = state.db()?;
    find_case(&mut conn, case_id)?;

    let docs: Vec<Document> = documents::table
        .left_join(document_tombstones::table)
        .filter(documents::case_id.eq(case_id))
        .filter(document_tombstones::document_id.is_null())
        .order(documents::created_at.desc())
        .select(Document::as_select())
        .load(&mut conn)?;

    Ok(docs.into_iter().map(DocumentSummary::from).collect())
}
