use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = advocates)]
pub struct Advocate {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = advocates)]
pub struct NewAdvocate {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = clients)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub contact_number: String,
    pub address: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = clients)]
pub struct NewClient {
    pub id: Uuid,
    pub name: String,
    pub contact_number: String,
    pub address: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = cases)]
#[diesel(belongs_to(Client))]
pub struct Case {
    pub id: Uuid,
    pub name: String,
    pub case_type: String,
    pub description: Option<String>,
    pub filing_date: NaiveDateTime,
    pub client_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cases)]
pub struct NewCase {
    pub id: Uuid,
    pub name: String,
    pub case_type: String,
    pub description: Option<String>,
    pub filing_date: NaiveDateTime,
    pub client_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = advocate_cases)]
pub struct NewAdvocateCase {
    pub advocate_id: Uuid,
    pub case_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = advocate_clients)]
pub struct NewAdvocateClient {
    pub advocate_id: Uuid,
    pub client_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Advocate))]
#[diesel(belongs_to(Case))]
pub struct Document {
    pub id: Uuid,
    pub doc_type: String,
    pub file_name: String,
    pub file_path: String,
    pub s3_key: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub version_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub advocate_id: Uuid,
    pub case_id: Uuid,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub doc_type: String,
    pub file_name: String,
    pub file_path: String,
    pub s3_key: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub version_id: Option<String>,
    pub advocate_id: Uuid,
    pub case_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_tombstones)]
pub struct NewDocumentTombstone {
    pub document_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orphaned_blobs)]
pub struct OrphanedBlob {
    pub id: Uuid,
    pub s3_key: String,
    pub reason: String,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orphaned_blobs)]
pub struct NewOrphanedBlob {
    pub id: Uuid,
    pub s3_key: String,
    pub reason: String,
}
