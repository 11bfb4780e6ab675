//! Wardgate Auth — credential validation, token issuance, the
//! active-session index and the session lifecycle manager.

pub mod alert;
pub mod config;
pub mod credentials;
pub mod error;
pub mod index;
pub mod locks;
pub mod service;
pub mod token;

pub use alert::{
    AlertDispatcher, AlertError, AlertFanout, AlertRetryQueue, FanoutReport, LogAlertDispatcher,
    LoginAlert, RetryPolicy, spawn_retry_worker,
};
pub use config::AuthConfig;
pub use credentials::CredentialValidator;
pub use error::AuthError;
pub use index::{ActiveSessionIndex, IndexConfig};
pub use locks::UserLocks;
pub use service::{LoginInput, LoginOutput, SessionManager, VerifiedAccess};
pub use token::AccessTokenClaims;
