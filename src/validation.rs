//! Input validation for registry and upload requests.
//!
//! Everything here is side-effect free apart from reading the upload body,
//! which is always rewound to its start before control returns.

use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use mime_guess::mime::{self, Mime};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use uuid::Uuid;

use crate::config::{
    DEFAULT_ALLOWED_DOCUMENT_TYPES, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_UPLOAD_BYTES,
};
use crate::error::AppError;

pub const SIZE_CHECK_CHUNK_BYTES: usize = 8 * 1024;

// Column widths from the migrations.
pub const NAME_MAX_CHARS: usize = 255;
pub const EMAIL_MAX_CHARS: usize = 255;
pub const CONTACT_NUMBER_MAX_CHARS: usize = 50;
pub const ADDRESS_MAX_CHARS: usize = 255;
pub const CASE_TYPE_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const CONTENT_TYPE_MAX_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be a valid UUID")]
    InvalidId { field: &'static str },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("filing_date must be a date (YYYY-MM-DD) or an RFC 3339 timestamp")]
    InvalidDate,
    #[error("file must not be empty")]
    EmptyFile,
    #[error("file size exceeds maximum limit of {limit} bytes")]
    FileTooLarge { limit: u64 },
    #[error("file name must carry an extension")]
    MissingExtension,
    #[error("file type .{extension} not allowed. Allowed types: {allowed}")]
    ExtensionNotAllowed { extension: String, allowed: String },
    #[error("document type '{doc_type}' not allowed. Allowed values: {allowed}")]
    DocumentTypeNotAllowed { doc_type: String, allowed: String },
    #[error("failed to read uploaded file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationError> for AppError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::Io(_) => AppError::persistence(value),
            other => AppError::invalid_input(other.to_string()),
        }
    }
}

pub fn parse_id(field: &'static str, raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidId { field })
}

/// Trimmed, non-empty text of at most `max` characters.
pub fn required_text(
    field: &'static str,
    raw: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    check_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

/// Blank input counts as absent.
pub fn optional_text(
    field: &'static str,
    raw: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            check_length(field, value, max)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = required_text("email", raw, EMAIL_MAX_CHARS)?.to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email)
        }
        _ => Err(ValidationError::InvalidEmail),
    }
}

pub fn parse_filing_date(raw: &str) -> Result<NaiveDateTime, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(parsed);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or(ValidationError::InvalidDate)
}

/// Lower-cased extension of a declared file name, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name.trim())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Server-side name for a stored file. Only the extension of the client
/// name survives.
pub fn sanitize_filename(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), extension.to_lowercase())
}

/// Streams `body` in fixed-size chunks and returns its length, failing as
/// soon as the running total passes `limit`. The body is rewound either way.
pub async fn measure_size<R>(body: &mut R, limit: u64) -> Result<u64, ValidationError>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let outcome = count_bytes(body, limit).await;
    body.seek(SeekFrom::Start(0)).await?;
    outcome
}

async fn count_bytes<R>(body: &mut R, limit: u64) -> Result<u64, ValidationError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; SIZE_CHECK_CHUNK_BYTES];
    let mut total: u64 = 0;
    loop {
        let read = body.read(&mut chunk).await?;
        if read == 0 {
            return Ok(total);
        }
        total += read as u64;
        if total > limit {
            return Err(ValidationError::FileTooLarge { limit });
        }
    }
}

/// Normalized, safe description of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub file_name: String,
    pub extension: String,
    pub doc_type: String,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_file_size: u64,
    allowed_extensions: BTreeSet<String>,
    allowed_document_types: BTreeSet<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_UPLOAD_BYTES,
            DEFAULT_ALLOWED_EXTENSIONS.iter().map(|ext| ext.to_string()),
            DEFAULT_ALLOWED_DOCUMENT_TYPES
                .iter()
                .map(|doc_type| doc_type.to_string()),
        )
    }
}

impl UploadPolicy {
    pub fn new(
        max_file_size: u64,
        allowed_extensions: impl IntoIterator<Item = String>,
        allowed_document_types: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .collect(),
            allowed_document_types: allowed_document_types
                .into_iter()
                .map(|doc_type| doc_type.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn check_extension(&self, file_name: &str) -> Result<String, ValidationError> {
        let extension = file_extension(file_name).ok_or(ValidationError::MissingExtension)?;
        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::ExtensionNotAllowed {
                extension,
                allowed: join(&self.allowed_extensions),
            });
        }
        Ok(extension)
    }

    pub fn check_document_type(&self, raw: &str) -> Result<String, ValidationError> {
        let doc_type = raw.trim().to_lowercase();
        if !self.allowed_document_types.contains(&doc_type) {
            return Err(ValidationError::DocumentTypeNotAllowed {
                doc_type: raw.trim().to_string(),
                allowed: join(&self.allowed_document_types),
            });
        }
        Ok(doc_type)
    }

    /// Runs the size, extension and category checks over an upload and
    /// produces the descriptor later stages work from.
    pub async fn inspect<R>(
        &self,
        declared_name: &str,
        declared_content_type: Option<&str>,
        doc_type: &str,
        body: &mut R,
    ) -> Result<FileDescriptor, ValidationError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let size = measure_size(body, self.max_file_size).await?;
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        let extension = self.check_extension(declared_name)?;
        let doc_type = self.check_document_type(doc_type)?;
        let content_type = declared_content_type
            .and_then(mime_essence)
            .unwrap_or_else(|| {
                mime_guess::from_ext(&extension)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });

        Ok(FileDescriptor {
            file_name: sanitize_filename(&extension),
            extension,
            doc_type,
            size,
            content_type,
        })
    }
}

/// `type/subtype` of a declared content type, parameters dropped. Values
/// that do not parse, are generic, or exceed the column width yield `None`.
fn mime_essence(declared: &str) -> Option<String> {
    let parsed: Mime = declared.trim().parse().ok()?;
    if parsed == mime::APPLICATION_OCTET_STREAM {
        return None;
    }
    let essence = parsed.essence_str().to_lowercase();
    (essence.chars().count() <= CONTENT_TYPE_MAX_CHARS).then_some(essence)
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}
