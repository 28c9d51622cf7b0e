//! Bookkeeping for blobs that were written but never committed.
//!
//! The upload pipeline records a row here when its compensating delete
//! fails, and deletion records one when the blob is gone but the document
//! could not be retired. `maintenance sweep-orphans` retries those deletes.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewDocumentTombstone, NewOrphanedBlob, OrphanedBlob};
use crate::schema::{document_tombstones, documents, orphaned_blobs};
use crate::storage::ObjectStorage;

pub fn record_orphaned_blob(conn: &mut PgConnection, s3_key: &str, reason: &str) -> AppResult<Uuid> {
    let row = NewOrphanedBlob {
        id: Uuid::new_v4(),
        s3_key: s3_key.to_string(),
        reason: reason.to_string(),
    };
    diesel::insert_into(orphaned_blobs::table)
        .values(&row)
        .execute(conn)?;
    Ok(row.id)
}

pub fn list_unresolved(conn: &mut PgConnection) -> AppResult<Vec<OrphanedBlob>> {
    Ok(orphaned_blobs::table
        .filter(orphaned_blobs::resolved_at.is_null())
        .order(orphaned_blobs::created_at.asc())
        .select(OrphanedBlob::as_select())
        .load(conn)?)
}

/// Marks the orphan resolved and tombstones any live document still
/// pointing at its key, so a record whose retirement failed after its blob
/// was deleted stops being served.
pub fn mark_resolved(conn: &mut PgConnection, orphan: &OrphanedBlob) -> AppResult<()> {
    conn.transaction::<_, AppError, _>(|conn| {
        let dangling: Vec<Uuid> = documents::table
            .left_join(document_tombstones::table)
            .filter(documents::s3_key.eq(&orphan.s3_key))
            .filter(document_tombstones::document_id.is_null())
            .select(documents::id)
            .load(conn)?;

        for document_id in dangling {
            diesel::insert_into(document_tombstones::table)
                .values(&NewDocumentTombstone { document_id })
                .on_conflict_do_nothing()
                .execute(conn)?;
            info!(document_id = %document_id, key = %orphan.s3_key, "retired document left dangling by a failed delete");
        }

        let updated = diesel::update(orphaned_blobs::table.find(orphan.id))
            .set(orphaned_blobs::resolved_at.eq(Some(Utc::now().naive_utc())))
            .execute(conn)?;
        if updated == 0 {
            return Err(AppError::not_found("orphaned blob record not found"));
        }
        Ok(())
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub resolved: usize,
    pub failed: usize,
}

/// Retries deletion of every unresolved orphan. Rows whose delete still
/// fails stay unresolved for the next sweep.
pub async fn sweep_orphans(
    conn: &mut PgConnection,
    storage: &dyn ObjectStorage,
) -> AppResult<SweepReport> {
    let mut report = SweepReport::default();
    for orphan in list_unresolved(conn)? {
        match storage.delete_object(&orphan.s3_key).await {
            Ok(()) => {
                mark_resolved(conn, &orphan)?;
                info!(orphan_id = %orphan.id, key = %orphan.s3_key, "orphaned blob removed");
                report.resolved += 1;
            }
            Err(err) => {
                warn!(orphan_id = %orphan.id, key = %orphan.s3_key, error = %err, "orphaned blob still present");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
