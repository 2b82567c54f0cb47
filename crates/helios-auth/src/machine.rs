//! Login state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │     Unknown     │ (initial)
//!                  └───┬─────────┬───┘
//!   SessionEstablished │         │ NoCredential / CredentialRejected /
//!                      │         │ SignedOut
//!                      ▼         ▼
//!         ┌─────────────────┐         ┌─────────────────┐
//!      ┌─►│  Authenticated  │ ──────► │ Unauthenticated │
//!      │  └─────────────────┘         └────────┬────────┘
//!      │      SignedOut / CredentialRejected   │
//!      └───────────────────────────────────────┘
//!                  SessionEstablished
//! ```
//!
//! `Authenticated` re-enters itself on every routine renewal. `Unknown`
//! exists only before the first renewal attempt resolves; once left it
//! is never re-entered for the lifetime of the process.

use rust_fsm::*;

// Generates a module `login_machine` with State, Input and StateMachine
// types, mirroring how the FSM macro is used elsewhere in the stack.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub login_machine(Unknown)

    Unknown => {
        SessionEstablished => Authenticated,
        CredentialRejected => Unauthenticated,
        NoCredential => Unauthenticated,
        SignedOut => Unauthenticated
    },
    Authenticated => {
        SessionEstablished => Authenticated,
        CredentialRejected => Unauthenticated,
        SignedOut => Unauthenticated
    },
    Unauthenticated => {
        SessionEstablished => Authenticated,
        CredentialRejected => Unauthenticated,
        NoCredential => Unauthenticated
    }
}

pub use login_machine::Input as LoginMachineInput;
pub use login_machine::State as LoginMachineState;
pub use login_machine::StateMachine as LoginMachine;

/// Login state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// The first renewal attempt has not resolved yet.
    Unknown,
    /// A session is established.
    Authenticated,
    /// No session.
    Unauthenticated,
}

impl LoginState {
    /// Returns true if a session is established.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, LoginState::Authenticated)
    }

    /// `Some(authenticated)` once resolved, `None` while unknown.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LoginState::Unknown => None,
            LoginState::Authenticated => Some(true),
            LoginState::Unauthenticated => Some(false),
        }
    }
}

impl From<&LoginMachineState> for LoginState {
    fn from(state: &LoginMachineState) -> Self {
        match state {
            LoginMachineState::Unknown => LoginState::Unknown,
            LoginMachineState::Authenticated => LoginState::Authenticated,
            LoginMachineState::Unauthenticated => LoginState::Unauthenticated,
        }
    }
}
