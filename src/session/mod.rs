//! Stateless session tokens and the per-interaction session state machine.
//!
//! ## Design Decisions
//! - Tokens carry their own principal and expiry and are HMAC-SHA256 signed;
//!   no server-side session table exists.
//! - There is no revocation. A token stays valid for its whole lifetime even
//!   if the directory changes underneath it.

pub mod lifecycle;
pub mod token;

pub use lifecycle::{Session, SessionError, SessionLifecycle, SessionState};
pub use token::{SessionToken, SessionTokenCodec, SigningKey, TokenClaims, TokenError};
