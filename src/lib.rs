//! Colonos: resident authentication for a gated community.
//!
//! Residents are looked up in a shared spreadsheet directory (with a local
//! cache for outages), authenticated by name and personal access code, and
//! handed a signed, self-contained session token. Authenticated residents
//! can register visitor passes that land back in the same directory.

pub mod auth;
pub mod config;
pub mod directory;
pub mod portal;
pub mod session;
pub mod visitor;

pub use config::Config;
pub use portal::Portal;
