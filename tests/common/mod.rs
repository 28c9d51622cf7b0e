use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use http_body_util::BodyExt;
use lexdocs::config::{
    AppConfig, DEFAULT_ALLOWED_DOCUMENT_TYPES, DEFAULT_ALLOWED_EXTENSIONS,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PRESIGNED_URL_TTL_SECONDS,
};
use lexdocs::db::{self, PgPool};
use lexdocs::routes;
use lexdocs::state::AppState;
use lexdocs::storage::{ObjectStorage, PutReceipt};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// In-memory `ObjectStorage` with switches for simulating outages.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    presign_counter: AtomicU64,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<PutReceipt> {
        if self.fail_puts.load(Ordering::SeqCst) {
            bail!("simulated put failure for {key}");
        }
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(PutReceipt {
            url: format!("https://fake-storage/test-bucket/{key}"),
            version_id: Some(format!("v-{}", guard.len())),
        })
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        let nonce = self.presign_counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://fake-storage/test-bucket/{key}?expires_in={}&signature={nonce}",
            expires_in.as_secs()
        ))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let guard = self.objects.lock().await;
        guard
            .get(key)
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| anyhow!("object {key} missing"))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("simulated delete failure for {key}");
        }
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }
}

#[allow(dead_code)]
impl FakeStorage {
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }

    /// Resolves a presigned URL handed out by this store back to its bytes.
    pub async fn fetch_presigned(&self, url: &str) -> Result<Vec<u8>> {
        let without_query = url.split('?').next().unwrap_or_default();
        let key = without_query
            .strip_prefix("https://fake-storage/test-bucket/")
            .ok_or_else(|| anyhow!("unexpected presigned url {url}"))?;
        self.get_object(key).await
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
pub struct FilePart<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

#[allow(dead_code)]
#[derive(Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

#[allow(dead_code)]
impl TestApp {
    /// Builds the app against `TEST_DATABASE_URL`; yields `None` when the
    /// variable is absent so database-backed tests are skipped.
    pub async fn try_new() -> Result<Option<Self>> {
        let database_url = match env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("TEST_DATABASE_URL not set; skipping database-backed test");
                return Ok(None);
            }
        };

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: owned(DEFAULT_ALLOWED_EXTENSIONS),
            allowed_document_types: owned(DEFAULT_ALLOWED_DOCUMENT_TYPES),
            presigned_url_ttl_seconds: DEFAULT_PRESIGNED_URL_TTL_SECONDS,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let state = AppState::new(pool, config, storage_for_state);
        let router = routes::create_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            storage,
        }))
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| reset_tables(conn)).await
    }

    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub async fn register_advocate(&self, name: &str, email: &str) -> Result<Uuid> {
        #[derive(Serialize)]
        struct Payload<'a> {
            name: &'a str,
            email: &'a str,
        }
        #[derive(Deserialize)]
        struct Created {
            advocate_id: Uuid,
        }
        let response = self
            .post_json("/api/advocates", &Payload { name, email })
            .await?;
        let created: Created = expect_json(response, StatusCode::CREATED).await?;
        Ok(created.advocate_id)
    }

    pub async fn register_client(&self, name: &str) -> Result<Uuid> {
        #[derive(Serialize)]
        struct Payload<'a> {
            name: &'a str,
            contact_number: &'a str,
            address: &'a str,
        }
        #[derive(Deserialize)]
        struct Created {
            client_id: Uuid,
        }
        let response = self
            .post_json(
                "/api/clients",
                &Payload {
                    name,
                    contact_number: "+91 98450 00000",
                    address: "12 High Court Road",
                },
            )
            .await?;
        let created: Created = expect_json(response, StatusCode::CREATED).await?;
        Ok(created.client_id)
    }

    pub async fn register_case(&self, name: &str, client_id: Uuid, advocate_id: Uuid) -> Result<Uuid> {
        #[derive(Serialize)]
        struct Payload<'a> {
            name: &'a str,
            case_type: &'a str,
            client_id: Uuid,
            advocate_id: Uuid,
        }
        #[derive(Deserialize)]
        struct Created {
            case_id: Uuid,
        }
        let response = self
            .post_json(
                "/api/cases",
                &Payload {
                    name,
                    case_type: "civil",
                    client_id,
                    advocate_id,
                },
            )
            .await?;
        let created: Created = expect_json(response, StatusCode::CREATED).await?;
        Ok(created.case_id)
    }

    /// Registers advocate, client and case and returns `(advocate, case)`.
    pub async fn seed_case(&self, email: &str) -> Result<(Uuid, Uuid)> {
        let advocate_id = self.register_advocate("A", email).await?;
        let client_id = self.register_client("C").await?;
        let case_id = self.register_case("Case1", client_id, advocate_id).await?;
        Ok((advocate_id, case_id))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        self.send(request).await
    }

    pub async fn post_raw(&self, path: &str, body: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?;
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    pub async fn upload_document(
        &self,
        advocate_id: &str,
        case_id: &str,
        doc_type: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<hyper::Response<Body>> {
        self.upload_multipart(
            &[
                ("advocate_id", advocate_id),
                ("case_id", case_id),
                ("doc_type", doc_type),
            ],
            Some(FilePart {
                filename,
                content_type: "application/octet-stream",
                data,
            }),
        )
        .await
    }

    pub async fn upload_multipart(
        &self,
        fields: &[(&str, &str)],
        file: Option<FilePart<'_>>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        if let Some(file) = file {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    file.filename
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            body.extend(file.data);
            body.extend(b"\r\n");
        }
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/documents")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))?;
        self.send(request).await
    }

    pub async fn document_rows(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) AS count FROM documents").await
    }

    pub async fn tombstone_rows(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) AS count FROM document_tombstones")
            .await
    }

    pub async fn unresolved_orphans(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            use diesel::prelude::*;
            use lexdocs::schema::orphaned_blobs::dsl::*;
            let keys = orphaned_blobs
                .filter(resolved_at.is_null())
                .select(s3_key)
                .load::<String>(conn)
                .context("failed to load orphaned blobs")?;
            Ok(keys)
        })
        .await
    }

    /// Makes every document insert fail until the tables are reset.
    pub async fn break_document_inserts(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.batch_execute(
                "CREATE OR REPLACE FUNCTION reject_document_insert() RETURNS trigger AS $$
                 BEGIN RAISE EXCEPTION 'simulated commit failure'; END;
                 $$ LANGUAGE plpgsql;
                 CREATE TRIGGER reject_document_insert BEFORE INSERT ON documents
                 FOR EACH ROW EXECUTE FUNCTION reject_document_insert();",
            )
            .context("failed to install failing trigger")?;
            Ok(())
        })
        .await
    }

    /// Makes every tombstone insert fail until restored or reset.
    pub async fn break_tombstone_inserts(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.batch_execute(
                "CREATE OR REPLACE FUNCTION reject_tombstone_insert() RETURNS trigger AS $$
                 BEGIN RAISE EXCEPTION 'simulated tombstone failure'; END;
                 $$ LANGUAGE plpgsql;
                 CREATE TRIGGER reject_tombstone_insert BEFORE INSERT ON document_tombstones
                 FOR EACH ROW EXECUTE FUNCTION reject_tombstone_insert();",
            )
            .context("failed to install failing trigger")?;
            Ok(())
        })
        .await
    }

    pub async fn restore_inserts(&self) -> Result<()> {
        self.with_conn(|conn| drop_failing_triggers(conn)).await
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }

    async fn count(&self, sql: &'static str) -> Result<i64> {
        self.with_conn(move |conn| {
            use diesel::prelude::*;
            use diesel::sql_types::BigInt;

            #[derive(QueryableByName)]
            struct Count {
                #[diesel(sql_type = BigInt)]
                count: i64,
            }

            let row: Count = diesel::sql_query(sql)
                .get_result(conn)
                .context("failed to count rows")?;
            Ok(row.count)
        })
        .await
    }

    async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn expect_json<T: DeserializeOwned>(
    response: hyper::Response<Body>,
    status: StatusCode,
) -> Result<T> {
    let actual = response.status();
    let body = body_to_vec(response.into_body()).await?;
    ensure!(
        actual == status,
        "expected {status}, got {actual}: {}",
        String::from_utf8_lossy(&body)
    );
    Ok(serde_json::from_slice(&body)?)
}

#[allow(dead_code)]
pub async fn expect_error(response: hyper::Response<Body>, status: StatusCode) -> Result<ErrorBody> {
    expect_json(response, status).await
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        db::run_migrations(&mut conn)?;
        reset_tables(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn drop_failing_triggers(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "DROP TRIGGER IF EXISTS reject_document_insert ON documents;
         DROP TRIGGER IF EXISTS reject_tombstone_insert ON document_tombstones;",
    )
    .context("failed to drop failing triggers")?;
    Ok(())
}

fn reset_tables(conn: &mut PgConnection) -> Result<()> {
    drop_failing_triggers(conn)?;
    conn.batch_execute(
        "TRUNCATE TABLE orphaned_blobs, document_tombstones, documents, advocate_cases,
             advocate_clients, cases, clients, advocates RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
