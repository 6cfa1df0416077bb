//! Per-interaction session state machine.
//!
//! ```text
//! Unauthenticated --submit ok-------------> Authenticated (token emitted)
//! Unauthenticated --present valid token---> Authenticated (restored)
//! Authenticated   --present same principal> Authenticated
//! Authenticated   --present expired-------> Expired
//! Authenticated   --present bad/other-----> Unauthenticated
//! Expired         --present anything------> Expired
//! Authenticated | Expired --logout--------> Unauthenticated
//! ```
//!
//! The state is owned by one interaction context and never shared across
//! principals. The directory resolver and token codec are shared.

use super::token::{SessionToken, SessionTokenCodec, TokenClaims, TokenError};
use crate::auth::{authenticate, AuthError};
use crate::directory::{DirectoryError, DirectoryResolver};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Runtime view of an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal_name: String,
    pub principal_credential: String,
    pub is_authenticated: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn from_claims(claims: TokenClaims, lifetime: Duration) -> Self {
        let lifetime = TimeDelta::from_std(lifetime).unwrap_or(TimeDelta::zero());
        Self {
            issued_at: claims.expires_at - lifetime,
            principal_name: claims.principal_name,
            principal_credential: claims.principal_credential,
            is_authenticated: true,
            expires_at: claims.expires_at,
        }
    }

    fn same_principal(&self, claims: &TokenClaims) -> bool {
        self.principal_name == claims.principal_name
            && self.principal_credential == claims.principal_credential
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Session),
    /// The bound token ran out; only `logout` leaves this state.
    Expired { principal_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("token belongs to a different principal")]
    PrincipalMismatch,
    #[error("a session is already bound; log out first")]
    LogoutRequired,
}

impl SessionError {
    /// Text safe to show the holder.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Directory(_) => "Cannot verify credentials right now, please try again later",
            Self::Auth(e) => e.public_message(),
            Self::Token(TokenError::Expired) => "Your session has expired, please sign in again",
            Self::Token(_) | Self::PrincipalMismatch => "Please sign in",
            Self::LogoutRequired => "Please sign out first",
        }
    }
}

pub struct SessionLifecycle {
    resolver: Arc<DirectoryResolver>,
    codec: Arc<SessionTokenCodec>,
    lifetime: Duration,
    state: SessionState,
}

impl SessionLifecycle {
    pub fn new(
        resolver: Arc<DirectoryResolver>,
        codec: Arc<SessionTokenCodec>,
        lifetime: Duration,
    ) -> Self {
        Self {
            resolver,
            codec,
            lifetime,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match self.state {
            SessionState::Authenticated(ref session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// Authenticate `name` + `credential` and emit a token for the holder.
    ///
    /// Refreshes the directory first. If the refresh is unavailable but a
    /// previously resolved table is in memory, that table is used.
    pub async fn submit(
        &mut self,
        name: &str,
        credential: &str,
    ) -> Result<SessionToken, SessionError> {
        if self.state != SessionState::Unauthenticated {
            return Err(SessionError::LogoutRequired);
        }

        let table = match self.resolver.refresh().await {
            Ok(table) => table,
            Err(e) => {
                let stale = self.resolver.table();
                if stale.is_empty() {
                    return Err(e.into());
                }
                tracing::warn!("Directory refresh unavailable; using table already in memory");
                stale
            }
        };

        let record = authenticate(&table, name, credential)?;
        let issued_at = Utc::now();
        let token = self.codec.issue_at(
            record.owner_name.trim(),
            record.credential.trim(),
            self.lifetime,
            issued_at,
        )?;

        self.state = SessionState::Authenticated(Session {
            principal_name: record.owner_name.trim().to_string(),
            principal_credential: record.credential.trim().to_string(),
            is_authenticated: true,
            issued_at,
            expires_at: token.expires_at(),
        });
        Ok(token)
    }

    /// Check a presented token and advance the state accordingly.
    pub fn present_token(&mut self, token: &str) -> Result<Session, SessionError> {
        if let SessionState::Expired { .. } = self.state {
            return Err(TokenError::Expired.into());
        }

        let next = match (&self.state, self.codec.verify_claims(token)) {
            (SessionState::Authenticated(current), Ok(claims)) => {
                if current.same_principal(&claims) {
                    Ok(current.clone())
                } else {
                    tracing::warn!("Presented token names a different principal; unbinding");
                    Err((SessionState::Unauthenticated, SessionError::PrincipalMismatch))
                }
            }
            (_, Ok(claims)) => Ok(Session::from_claims(claims, self.lifetime)),
            (SessionState::Authenticated(current), Err(TokenError::Expired)) => Err((
                SessionState::Expired {
                    principal_name: current.principal_name.clone(),
                },
                TokenError::Expired.into(),
            )),
            (_, Err(e)) => Err((SessionState::Unauthenticated, e.into())),
        };

        match next {
            Ok(session) => {
                self.state = SessionState::Authenticated(session.clone());
                Ok(session)
            }
            Err((state, e)) => {
                tracing::debug!("Session token rejected: {e}");
                self.state = state;
                Err(e)
            }
        }
    }

    /// Drop the principal binding. Returns whether one was bound.
    ///
    /// The holder is responsible for erasing its stored token.
    pub fn logout(&mut self) -> bool {
        let previous = std::mem::replace(&mut self.state, SessionState::Unauthenticated);
        match previous {
            SessionState::Authenticated(Session { principal_name, .. })
            | SessionState::Expired { principal_name } => {
                tracing::info!(owner = %principal_name, "Session logged out");
                true
            }
            SessionState::Unauthenticated => false,
        }
    }
}
