//! Authentication session management for the Helios SDK.
//!
//! This crate provides:
//! - [`AuthClient`]: register/login/logout orchestration over an
//!   explicit login state machine
//! - Background access-token renewal with wake-from-suspend detection
//!   and single-flight renewal exchanges
//! - Refresh-token persistence through a pluggable storage backend
//! - Handle-based auth-state and token-change subscriptions
//! - The [`AuthTransport`] boundary with a reqwest implementation

mod claims;
mod client;
mod config;
mod error;
mod http;
mod machine;
mod scheduler;
mod session;
mod subscribers;
mod transport;

pub use claims::{decode_claims, Claims};
pub use client::{AuthClient, LoginOutcome, RegisterOutcome};
pub use config::{AuthConfig, CredentialTransport, DEFAULT_CLAIMS_NAMESPACE};
pub use error::{AuthError, AuthResult};
pub use machine::{login_machine, LoginMachine, LoginMachineInput, LoginMachineState, LoginState};
pub use session::{Session, UserRecord};
pub use subscribers::SubscriptionId;
pub use transport::{
    AuthTransport, LoginResponse, MfaSecret, RegisterOptions, RegisterRequest, SessionPayload,
};
pub use http::HttpTransport;
