//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. User lookups require a
//! `tenant_id` parameter to enforce data isolation; sessions are
//! addressed by their globally unique id.

use uuid::Uuid;

use crate::error::WardgateResult;
use crate::models::{
    session::{CreateSession, Session},
    tenant::{CreateTenant, Tenant},
    user::{CreateUser, User},
};

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = WardgateResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardgateResult<Tenant>> + Send;
}

pub trait UserRepository: Send + Sync {
    /// Fails with `NotFound` if the tenant does not exist and with
    /// `AlreadyExists` if the email is taken within the tenant.
    fn create(&self, input: CreateUser) -> impl Future<Output = WardgateResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = WardgateResult<User>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = WardgateResult<User>> + Send;
    /// Hash and store a new password.
    fn set_password(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        password: &str,
    ) -> impl Future<Output = WardgateResult<User>> + Send;
}

/// Durable session record. Authoritative for session status.
pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = WardgateResult<Session>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardgateResult<Session>> + Send;
    fn list_active_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = WardgateResult<Vec<Session>>> + Send;
    /// Mark a session inactive. Returns `false` if it was already
    /// inactive or does not exist.
    fn deactivate(&self, id: Uuid) -> impl Future<Output = WardgateResult<bool>> + Send;
    /// Mark every active session of the user inactive and return how
    /// many changed.
    fn deactivate_all_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = WardgateResult<u64>> + Send;
}
