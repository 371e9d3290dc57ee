pub mod auth;
pub mod identity;
pub mod storage_service;
pub mod validation;
