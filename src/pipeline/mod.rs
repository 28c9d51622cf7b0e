//! Document upload, retrieval and deletion.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Document;
use crate::schema::{document_tombstones, documents};

pub mod retrieval;
pub mod upload;

pub use retrieval::{
    delete_file, get_file, list_case_documents, DeleteMode, DocumentAccess, DocumentSummary,
};
pub use upload::{upload_document, IncomingFile, UploadReceipt, UploadRequest};

/// Loads a document that has no tombstone.
pub(crate) fn find_live_document(conn: &mut PgConnection, document_id: Uuid) -> AppResult<Document> {
    documents::table
        .left_join(document_tombstones::table)
        .filter(documents::id.eq(document_id))
        .filter(document_tombstones::document_id.is_null())
        .select(Document::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("File not found"))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
