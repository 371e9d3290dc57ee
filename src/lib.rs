//! Blob store: uploads images or JSON documents over HTTP and keeps them as
//! BLOB rows in SQLite.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
