//! HTTP handlers for artifact upload, listing, fetch and delete.
//! Storage concerns are delegated to `StorageService`; this layer only
//! extracts the multipart upload and shapes responses.

use crate::{
    errors::AppError,
    models::object::StoredObject,
    services::{
        storage_service::{IncomingUpload, StorageService},
        validation::ValidationError,
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Serialize;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// `{"success": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteAck {
    pub success: bool,
    pub message: String,
}

/// `POST /upload` — multipart form with a `file` field.
pub async fn upload_object(
    State(service): State<StorageService>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<StoredObject>>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let declared_size = field
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        // Reject on headers alone before buffering the body.
        service
            .variant
            .policy()
            .check_declared(content_type.as_deref(), declared_size)?;

        let payload = field.bytes().await.map_err(multipart_error)?;
        let object = service
            .upload(IncomingUpload {
                file_name,
                content_type,
                declared_size,
                payload,
            })
            .await?;

        return Ok(Envelope::ok(object));
    }

    Err(AppError::bad_request(format!(
        "multipart field `{FILE_FIELD}` is required"
    )))
}

/// `GET /{collection}` — metadata of all objects, newest first.
pub async fn list_objects(
    State(service): State<StorageService>,
) -> Result<Json<Envelope<Vec<StoredObject>>>, AppError> {
    let objects = service.list_metadata().await?;
    Ok(Envelope::ok(objects))
}

/// `GET /{collection}/{id}` — raw bytes with the stored content type.
pub async fn get_object(
    State(service): State<StorageService>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let stored = service.fetch_by_id(&id).await?;

    let mut response = Response::new(Body::from(stored.payload));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &stored.meta);

    Ok(response)
}

/// `DELETE /{collection}/{id}`
pub async fn delete_object(
    State(service): State<StorageService>,
    Path(id): Path<String>,
) -> Result<Json<DeleteAck>, AppError> {
    service.delete_by_id(&id).await?;
    Ok(Json(DeleteAck {
        success: true,
        message: format!("{} deleted successfully", service.variant.noun()),
    }))
}

/// Body-limit hits become `PAYLOAD_TOO_LARGE`; anything else is a bad request.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::PayloadTooLarge.into()
    } else {
        AppError::bad_request(err.body_text())
    }
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size.max(0) as u64),
    );

    if let Ok(value) = HeaderValue::from_str(&content_disposition(&meta.name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}

/// `inline; filename="..."`, plus an RFC 5987 `filename*` when the name is
/// not plain ASCII.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let mut value = format!("inline; filename=\"{fallback}\"");
    if !name.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        value.push_str(&urlencoding::encode(name));
    }
    value
}
