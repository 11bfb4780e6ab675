//! Tenant domain model.
//!
//! Tenants provide full data isolation. Every user and session belongs
//! to exactly one tenant, and every lookup is scoped by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WardgateError, WardgateResult};

/// An isolated deployment unit (for example one hospital).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// The tenant a request is executing under.
///
/// Produced once at the edge from the caller-supplied identity header
/// and passed down explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

impl TenantContext {
    /// Parse the raw tenant header value.
    ///
    /// A missing or blank header is a [`WardgateError::TenantContext`];
    /// a value that is not a well-formed identifier is a
    /// [`WardgateError::Validation`].
    pub fn from_header(raw: Option<&str>) -> WardgateResult<Self> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());
        let Some(raw) = raw else {
            return Err(WardgateError::TenantContext);
        };

        let tenant_id = Uuid::try_parse(raw).map_err(|_| WardgateError::Validation {
            message: format!("malformed tenant id: {raw}"),
        })?;

        Ok(Self { tenant_id })
    }
}
