use crate::directory::{normalize, DirectoryRecord, DirectoryTable};

/// Message shown to users for any rejected name/credential pair.
const PUBLIC_REJECTION: &str = "Invalid resident name or access code";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Name or credential was blank.
    #[error("resident name and access code are required")]
    MissingInput,
    /// No resident with that name.
    #[error("unknown principal")]
    UnknownPrincipal,
    /// Resident found, credential differs.
    #[error("bad credential")]
    BadCredential,
}

impl AuthError {
    /// User-facing text. Unknown names and wrong codes share one message.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingInput => "Please fill in both fields",
            Self::UnknownPrincipal | Self::BadCredential => PUBLIC_REJECTION,
        }
    }
}

/// Match `name` + `credential` against `table`.
///
/// Pure function of its inputs; callers refresh the table beforehand.
pub fn authenticate(
    table: &DirectoryTable,
    name: &str,
    credential: &str,
) -> Result<DirectoryRecord, AuthError> {
    if name.trim().is_empty() || credential.trim().is_empty() {
        return Err(AuthError::MissingInput);
    }

    let Some(record) = table.find_owner(name) else {
        tracing::warn!("Authentication failed: unknown principal");
        return Err(AuthError::UnknownPrincipal);
    };

    let expected = normalize(&record.credential);
    let attempt = normalize(credential);
    if !codes_match(expected.as_bytes(), attempt.as_bytes()) {
        tracing::warn!(owner = %record.owner_name, "Authentication failed: bad credential");
        return Err(AuthError::BadCredential);
    }

    tracing::info!(owner = %record.owner_name, "Resident authenticated");
    Ok(record.clone())
}

/// True when both codes are byte-equal. Every byte pair is visited, so the
/// running time depends only on the lengths.
fn codes_match(expected: &[u8], attempt: &[u8]) -> bool {
    expected.len() == attempt.len()
        && expected
            .iter()
            .zip(attempt)
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}
