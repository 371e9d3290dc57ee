//! The two flavours of the store: images and JSON documents.
//!
//! Both share one storage core. A variant only decides which table is used,
//! which URL the collection lives under, how uploads are validated and
//! whether a bearer token is required.

use crate::services::validation::ContentPolicy;
use clap::ValueEnum;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// Any `image/*` upload, no authorization.
    Images,
    /// JSON documents behind a bearer token.
    Json,
}

impl Variant {
    /// Backing table. Only ever one of two literals, so it is safe to splice
    /// into SQL text.
    pub fn table(self) -> &'static str {
        match self {
            Variant::Images => "images",
            Variant::Json => "json_files",
        }
    }

    /// Route of the collection, e.g. `/images`.
    pub fn collection_path(self) -> &'static str {
        match self {
            Variant::Images => "/images",
            Variant::Json => "/json-files",
        }
    }

    pub fn policy(self) -> ContentPolicy {
        match self {
            Variant::Images => ContentPolicy::Image,
            Variant::Json => ContentPolicy::Json,
        }
    }

    pub fn requires_auth(self) -> bool {
        matches!(self, Variant::Json)
    }

    /// Placeholder name used when the client sends no filename.
    pub fn default_name(self, id: &str) -> String {
        match self {
            Variant::Images => format!("image_{id}"),
            Variant::Json => format!("json_file_{id}.json"),
        }
    }

    /// Singular noun used in client-facing messages.
    pub fn noun(self) -> &'static str {
        match self {
            Variant::Images => "Image",
            Variant::Json => "JSON file",
        }
    }

    pub fn api_title(self) -> &'static str {
        match self {
            Variant::Images => "Image Store API",
            Variant::Json => "JSON Store API",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Images => f.write_str("images"),
            Variant::Json => f.write_str("json"),
        }
    }
}
