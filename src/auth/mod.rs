//! Authentication module
//!
//! Username/password checks against the user directory.

mod credentials;
mod directory;

pub use credentials::{hash_password, Credential};
pub use directory::{User, UserDirectory};

use std::sync::Arc;

/// Why a CONNECT was rejected. Operator-facing only: both variants map to
/// the same return code so clients cannot tell which usernames exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownIdentity,
    BadCredential,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownIdentity => "unknown-identity",
            Self::BadCredential => "bad-credential",
        }
    }
}

/// CONNACK return codes produced by this agent (MQTT 3.1.1 numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectReturnCode {
    Accepted = 0x00,
    BadUsernameOrPassword = 0x04,
}

impl ConnectReturnCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::BadUsernameOrPassword => "bad-username-or-password",
        }
    }
}

/// Result of authentication
#[derive(Debug, Clone)]
pub enum AuthResult {
    Authenticated(Arc<User>),
    Rejected(AuthFailure),
}

impl AuthResult {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn user(&self) -> Option<&Arc<User>> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Rejected(_) => None,
        }
    }

    pub fn failure(&self) -> Option<AuthFailure> {
        match self {
            Self::Authenticated(_) => None,
            Self::Rejected(failure) => Some(*failure),
        }
    }

    /// The code reported back to the client
    pub fn return_code(&self) -> ConnectReturnCode {
        match self {
            Self::Authenticated(_) => ConnectReturnCode::Accepted,
            Self::Rejected(_) => ConnectReturnCode::BadUsernameOrPassword,
        }
    }
}
