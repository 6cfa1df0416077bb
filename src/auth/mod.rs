//! Resident authentication against the resolved directory table.
//!
//! Provides:
//! - Name lookup (trimmed, case-insensitive, first match wins)
//! - Credential check with the same normalization
//!
//! ## Design Decisions
//! - Credentials are stored and compared in plaintext; the directory is a
//!   shared spreadsheet of personal access codes, not a password database.
//! - The comparison itself is constant-time over the normalized bytes.
//! - Failures keep distinct variants for logs, but callers show users
//!   [`AuthError::public_message`], which does not reveal which part was wrong.

pub mod engine;

pub use engine::{authenticate, AuthError};
