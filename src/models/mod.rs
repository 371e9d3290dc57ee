//! Core data models for the blob store.
//!
//! Stored artifacts map to database rows via `sqlx::FromRow` and serialize
//! as JSON via `serde`.

pub mod object;
pub mod variant;
