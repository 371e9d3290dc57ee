//! src/services/storage_service.rs
//!
//! StorageService — upload/list/fetch/delete of artifacts held as BLOB rows in
//! SQLite. Payload bytes live inline in the row next to their metadata, so a
//! committed artifact is always complete. Each write runs in its own
//! transaction which is committed before the call returns and rolled back on
//! every other exit path.

use crate::{
    models::{
        object::{NewObject, StoredObject, StoredPayload},
        variant::Variant,
    },
    services::{identity::assign_object_id, validation::ValidationError},
};
use bytes::Bytes;
use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

/// Schema applied by [`StorageService::migrate`]. Every statement is
/// idempotent.
const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const METADATA_COLUMNS: &str = "id, name, size, content_type, created_at, updated_at";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// An upload as received from the client, not yet validated.
#[derive(Debug, Clone)]
pub struct IncomingUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Size announced by the client ahead of the body, if any.
    pub declared_size: Option<u64>,
    pub payload: Bytes,
}

/// StorageService provides the artifact operations for one [`Variant`]:
/// - Upload (validate, assign an id, insert)
/// - List metadata, newest first, without payloads
/// - Fetch one artifact with its bytes
/// - Delete one artifact
///
/// The service is cheap to clone and is handed to every request as axum
/// state. It holds no mutable state of its own; the pool is the only shared
/// resource.
#[derive(Clone)]
pub struct StorageService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    /// Which table and validation rules this instance serves.
    pub variant: Variant,
}

/// Open a pool whose acquire attempts give up after `acquire_timeout`, so an
/// exhausted pool or unreachable database surfaces as an error instead of a
/// hang.
pub async fn connect_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await
}

impl StorageService {
    pub fn new(db: Arc<SqlitePool>, variant: Variant) -> Self {
        Self { db, variant }
    }

    /// Apply the embedded schema for both variants.
    pub async fn migrate(db: &SqlitePool) -> Result<(), sqlx::Error> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        info!("Running {} migration statements...", statements.len());

        let mut tx = db.begin().await?;
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        tx.commit().await
    }

    /// Validate and persist an upload.
    ///
    /// Validation finishes before an id is drawn or a transaction is opened,
    /// so rejected uploads leave no trace.
    pub async fn upload(&self, upload: IncomingUpload) -> StorageResult<StoredObject> {
        let content_type = self.variant.policy().validate(
            upload.content_type.as_deref(),
            upload.declared_size,
            &upload.payload,
        )?;

        let id = assign_object_id();
        let name = upload
            .file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.variant.default_name(&id));

        let object = self
            .insert(NewObject {
                id,
                name,
                payload: upload.payload,
                content_type,
                created_at: Utc::now(),
            })
            .await?;

        info!(
            variant = %self.variant,
            id = %object.id,
            name = %object.name,
            size = object.size,
            "stored object"
        );
        Ok(object)
    }

    /// Insert a validated object in a single transaction.
    pub async fn insert(&self, new: NewObject) -> StorageResult<StoredObject> {
        let sql = format!(
            "INSERT INTO {} (id, name, payload, size, content_type, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            self.variant.table(),
            METADATA_COLUMNS
        );

        let mut tx = self.db.begin().await?;
        let object = sqlx::query_as::<_, StoredObject>(&sql)
            .bind(&new.id)
            .bind(&new.name)
            .bind(&new.payload[..])
            .bind(new.size())
            .bind(&new.content_type)
            .bind(new.created_at)
            .bind(new.created_at)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(object)
    }

    /// Metadata of every stored object, newest first.
    ///
    /// Only metadata columns are selected; payloads stay in the database.
    pub async fn list_metadata(&self) -> StorageResult<Vec<StoredObject>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC, rowid DESC",
            METADATA_COLUMNS,
            self.variant.table()
        );

        let rows = sqlx::query_as::<_, StoredObject>(&sql)
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// Fetch one object including its payload.
    pub async fn fetch_by_id(&self, id: &str) -> StorageResult<StoredPayload> {
        let sql = format!(
            "SELECT {}, payload FROM {} WHERE id = ?",
            METADATA_COLUMNS,
            self.variant.table()
        );

        sqlx::query_as::<_, StoredPayload>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Delete one object.
    ///
    /// The existence check and the delete share a transaction. Two concurrent
    /// deletes of the same id may both pass the check; the loser then sees
    /// zero affected rows and reports `NotFound`.
    pub async fn delete_by_id(&self, id: &str) -> StorageResult<()> {
        let table = self.variant.table();
        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_scalar::<_, String>(&format!(
            "SELECT id FROM {table} WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_none() {
            return Err(StorageError::NotFound(id.to_string()));
        }

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        tx.commit().await?;

        info!(variant = %self.variant, id, "deleted object");
        Ok(())
    }

    /// Round-trip a trivial query to confirm the database is reachable.
    pub async fn ping(&self) -> StorageResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::validation::MAX_UPLOAD_BYTES;

    async fn service(variant: Variant) -> StorageService {
        // One connection: every `sqlite::memory:` connection is its own database.
        let pool = connect_pool("sqlite::memory:", 1, Duration::from_secs(5))
            .await
            .unwrap();
        StorageService::migrate(&pool).await.unwrap();
        StorageService::new(Arc::new(pool), variant)
    }

    fn upload(name: Option<&str>, content_type: &str, payload: &[u8]) -> IncomingUpload {
        IncomingUpload {
            file_name: name.map(str::to_string),
            content_type: Some(content_type.to_string()),
            declared_size: None,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    async fn row_count(service: &StorageService) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {}",
            service.variant.table()
        ))
        .fetch_one(&*service.db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn binary_payload_round_trips_exactly() {
        let service = service(Variant::Images).await;
        let bytes = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\xff\x00";

        let stored = service
            .upload(upload(Some("pixel.png"), "image/png", bytes))
            .await
            .unwrap();
        assert_eq!(stored.size, bytes.len() as i64);
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.created_at, stored.updated_at);

        let fetched = service.fetch_by_id(&stored.id).await.unwrap();
        assert_eq!(fetched.payload, bytes);
        assert_eq!(fetched.meta, stored);
    }

    #[tokio::test]
    async fn json_payload_round_trips_and_is_normalized() {
        let service = service(Variant::Json).await;
        let doc = "{\"city\":\"Zürich\",\"emoji\":\"🦀\",\"nul\":\"\\u0000\"}";

        let stored = service
            .upload(upload(Some("doc.json"), "text/plain", doc.as_bytes()))
            .await
            .unwrap();
        assert_eq!(stored.content_type, "application/json");

        let fetched = service.fetch_by_id(&stored.id).await.unwrap();
        assert_eq!(fetched.payload, doc.as_bytes());
    }

    #[tokio::test]
    async fn missing_name_gets_placeholder() {
        let images = service(Variant::Images).await;
        let stored = images
            .upload(upload(None, "image/gif", b"GIF89a"))
            .await
            .unwrap();
        assert_eq!(stored.name, format!("image_{}", stored.id));

        let json = service(Variant::Json).await;
        let stored = json
            .upload(upload(Some(""), "application/json", b"{}"))
            .await
            .unwrap();
        assert_eq!(stored.name, format!("json_file_{}.json", stored.id));
    }

    #[tokio::test]
    async fn rejected_upload_writes_nothing() {
        let service = service(Variant::Json).await;

        let err = service
            .upload(upload(Some("bad.json"), "application/json", b"{not json"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation(ValidationError::MalformedPayload)
        ));

        let err = service
            .upload(upload(Some("x.csv"), "text/csv", b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation(ValidationError::InvalidContentType(_))
        ));

        assert_eq!(row_count(&service).await, 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let service = service(Variant::Images).await;
        let over = vec![7u8; MAX_UPLOAD_BYTES as usize + 1];

        let err = service
            .upload(upload(Some("big.png"), "image/png", &over))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation(ValidationError::PayloadTooLarge)
        ));
        assert_eq!(row_count(&service).await, 0);

        let at_limit = vec![7u8; MAX_UPLOAD_BYTES as usize];
        let stored = service
            .upload(upload(Some("big.png"), "image/png", &at_limit))
            .await
            .unwrap();
        assert_eq!(stored.size, MAX_UPLOAD_BYTES as i64);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_keeps_duplicates() {
        let service = service(Variant::Images).await;

        let mut ids = Vec::new();
        for name in ["a.png", "b.png", "c.png", "c.png"] {
            let stored = service
                .upload(upload(Some(name), "image/png", name.as_bytes()))
                .await
                .unwrap();
            ids.push(stored.id);
        }

        let listed = service.list_metadata().await.unwrap();
        let listed_ids: Vec<_> = listed.iter().map(|o| o.id.clone()).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids);

        let names: Vec<_> = listed.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["c.png", "c.png", "b.png", "a.png"]);
    }

    #[tokio::test]
    async fn delete_then_fetch_is_not_found() {
        let service = service(Variant::Images).await;
        let keep = service
            .upload(upload(Some("keep.png"), "image/png", b"k"))
            .await
            .unwrap();
        let gone = service
            .upload(upload(Some("gone.png"), "image/png", b"g"))
            .await
            .unwrap();

        service.delete_by_id(&gone.id).await.unwrap();

        assert!(matches!(
            service.fetch_by_id(&gone.id).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_by_id(&gone.id).await,
            Err(StorageError::NotFound(_))
        ));

        let listed = service.list_metadata().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let service = service(Variant::Json).await;
        assert!(matches!(
            service.fetch_by_id("no-such-id").await,
            Err(StorageError::NotFound(id)) if id == "no-such-id"
        ));
        assert!(matches!(
            service.delete_by_id("no-such-id").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn variants_use_separate_tables() {
        let images = service(Variant::Images).await;
        let json = StorageService::new(images.db.clone(), Variant::Json);

        let image = images
            .upload(upload(Some("a.png"), "image/png", b"png"))
            .await
            .unwrap();
        json.upload(upload(Some("a.json"), "application/json", b"[]"))
            .await
            .unwrap();

        assert_eq!(images.list_metadata().await.unwrap().len(), 1);
        assert_eq!(json.list_metadata().await.unwrap().len(), 1);
        assert!(matches!(
            json.fetch_by_id(&image.id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let service = service(Variant::Images).await;
        StorageService::migrate(&service.db).await.unwrap();
        service.ping().await.unwrap();
    }

    #[tokio::test]
    async fn closed_pool_surfaces_as_sqlx_error() {
        let service = service(Variant::Images).await;
        service.db.close().await;

        assert!(matches!(service.ping().await, Err(StorageError::Sqlx(_))));
        assert!(matches!(
            service.list_metadata().await,
            Err(StorageError::Sqlx(_))
        ));
        assert!(matches!(
            service
                .upload(upload(Some("a.png"), "image/png", b"x"))
                .await,
            Err(StorageError::Sqlx(_))
        ));
    }

    #[tokio::test]
    async fn insert_stores_a_sliced_payload_without_its_neighbours() {
        let service = service(Variant::Images).await;
        let frame = Bytes::from_static(b"HEAD\x00\xffbody\x01TAIL");
        let payload = frame.slice(4..11);

        let stored = service
            .insert(NewObject {
                id: assign_object_id(),
                name: "slice.png".to_string(),
                payload,
                content_type: "image/png".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(stored.size, 7);

        let fetched = service.fetch_by_id(&stored.id).await.unwrap();
        assert_eq!(fetched.payload, b"\x00\xffbody\x01");
    }
}
