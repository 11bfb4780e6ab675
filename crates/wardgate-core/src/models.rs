//! Domain models for Wardgate.

pub mod session;
pub mod tenant;
pub mod user;
