//! Upload validation: content-type whitelist, size ceiling and (for JSON)
//! well-formedness.
//!
//! Everything here is pure. The storage service runs it to completion before
//! an identifier is assigned or a transaction is opened.

use serde::de::IgnoredAny;
use thiserror::Error;

/// Largest accepted payload: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    InvalidContentType(String),
    #[error("File size must be less than 10MB")]
    PayloadTooLarge,
    #[error("File content is not valid JSON")]
    MalformedPayload,
}

impl ValidationError {
    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidContentType(_) => "INVALID_CONTENT_TYPE",
            ValidationError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ValidationError::MalformedPayload => "MALFORMED_PAYLOAD",
        }
    }
}

/// Per-variant acceptance rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentPolicy {
    /// Any `image/*` type.
    Image,
    /// `application/json` or `text/plain`, body must parse as JSON.
    Json,
}

impl ContentPolicy {
    /// Checks that can run before the body is read: content type and the
    /// declared size, if the client sent one.
    pub fn check_declared(
        self,
        content_type: Option<&str>,
        declared_size: Option<u64>,
    ) -> Result<(), ValidationError> {
        self.accepted_type(content_type)?;
        if declared_size.is_some_and(|size| size > MAX_UPLOAD_BYTES) {
            return Err(ValidationError::PayloadTooLarge);
        }
        Ok(())
    }

    /// Full validation of a completely read upload.
    ///
    /// Rules run in order and the first failure wins. On success returns the
    /// content type to persist.
    pub fn validate(
        self,
        content_type: Option<&str>,
        declared_size: Option<u64>,
        bytes: &[u8],
    ) -> Result<String, ValidationError> {
        let accepted = self.accepted_type(content_type)?;

        let actual = bytes.len() as u64;
        if declared_size.unwrap_or(actual) > MAX_UPLOAD_BYTES || actual > MAX_UPLOAD_BYTES {
            return Err(ValidationError::PayloadTooLarge);
        }

        if self == ContentPolicy::Json {
            let text = std::str::from_utf8(bytes).map_err(|_| ValidationError::MalformedPayload)?;
            serde_json::from_str::<IgnoredAny>(text)
                .map_err(|_| ValidationError::MalformedPayload)?;
        }

        Ok(accepted)
    }

    fn accepted_type(self, content_type: Option<&str>) -> Result<String, ValidationError> {
        let raw = content_type.map(str::trim).filter(|ct| !ct.is_empty());
        let Some(raw) = raw else {
            return Err(self.type_rejection());
        };
        let essence = media_type_essence(raw);

        match self {
            ContentPolicy::Image => {
                if essence.len() > "image/".len() && essence.starts_with("image/") {
                    Ok(raw.to_string())
                } else {
                    Err(self.type_rejection())
                }
            }
            ContentPolicy::Json => {
                if essence == "application/json" || essence == "text/plain" {
                    Ok("application/json".to_string())
                } else {
                    Err(self.type_rejection())
                }
            }
        }
    }

    fn type_rejection(self) -> ValidationError {
        let reason = match self {
            ContentPolicy::Image => "File must be an image",
            ContentPolicy::Json => "File must be a JSON document (application/json or text/plain)",
        };
        ValidationError::InvalidContentType(reason.to_string())
    }
}

/// `type/subtype` of a media type, lowercased, parameters stripped.
fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
