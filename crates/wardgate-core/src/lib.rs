//! Wardgate Core — domain models, error taxonomy and the storage
//! traits shared by every other crate.

pub mod cache;
pub mod error;
pub mod models;
pub mod repository;
