//! Signed, self-contained session tokens.
//!
//! Wire form: `base64url( name "|" credential "|" expires "|" hex(hmac) )`
//! where `expires` is UTC `YYYYMMDDhhmmss` and the HMAC-SHA256 covers
//! `name "|" credential "|" expires` under the process-wide signing key.
//!
//! Nothing is stored server-side. Verification recomputes the MAC before any
//! payload field is interpreted, then checks expiry.

use base64::Engine;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Field separator inside the decoded payload.
const SEPARATOR: char = '|';

/// Fixed-width, lexicographically sortable expiry layout.
const COMPACT_FORMAT: &str = "%Y%m%d%H%M%S";
const COMPACT_LEN: usize = 14;

/// Hex length of an HMAC-SHA256 tag.
const SIGNATURE_HEX_LEN: usize = 64;

const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed session token")]
    Malformed,
    #[error("session token signature mismatch")]
    BadSignature,
    #[error("session token expired")]
    Expired,
    /// A field contains the separator and could never round-trip.
    #[error("principal fields cannot be encoded into a session token")]
    Unencodable,
}

/// Secret key for token signatures. Never printed.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC can accept any key length")
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Opaque printable token handed to the holder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken {
    encoded: String,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn into_string(self) -> String {
        self.encoded
    }

    /// Expiry encoded in the token, at whole-second precision.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.encoded
    }
}

/// Authentic contents of a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub principal_name: String,
    pub principal_credential: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionTokenCodec {
    key: SigningKey,
}

impl SessionTokenCodec {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Issue a token valid for `lifetime` from now.
    pub fn issue(
        &self,
        principal_name: &str,
        principal_credential: &str,
        lifetime: std::time::Duration,
    ) -> Result<SessionToken, TokenError> {
        self.issue_at(principal_name, principal_credential, lifetime, Utc::now())
    }

    pub fn issue_at(
        &self,
        principal_name: &str,
        principal_credential: &str,
        lifetime: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, TokenError> {
        if principal_name.contains(SEPARATOR) || principal_credential.contains(SEPARATOR) {
            return Err(TokenError::Unencodable);
        }
        let lifetime = Duration::from_std(lifetime).map_err(|_| TokenError::Unencodable)?;
        let expires_at = now
            .checked_add_signed(lifetime)
            .ok_or(TokenError::Unencodable)?;
        let expires = expires_at.format(COMPACT_FORMAT).to_string();
        let expires_at = parse_compact(&expires).ok_or(TokenError::Unencodable)?;

        let signature = self.sign(principal_name, principal_credential, &expires);
        let payload = format!(
            "{principal_name}{SEPARATOR}{principal_credential}{SEPARATOR}{expires}{SEPARATOR}{signature}"
        );
        Ok(SessionToken {
            encoded: ENGINE.encode(payload),
            expires_at,
        })
    }

    /// Verify a presented token and return the principal it names.
    pub fn verify(&self, token: &str) -> Result<(String, String), TokenError> {
        self.verify_claims(token)
            .map(|c| (c.principal_name, c.principal_credential))
    }

    pub fn verify_claims(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let bytes = ENGINE
            .decode(token.trim())
            .map_err(|_| TokenError::Malformed)?;
        let payload = String::from_utf8(bytes).map_err(|_| TokenError::Malformed)?;

        let parts: Vec<&str> = payload.split(SEPARATOR).collect();
        let [name, credential, expires, signature] = parts.as_slice() else {
            return Err(TokenError::Malformed);
        };

        // Lowercase only: one signature has exactly one accepted spelling.
        if signature.len() != SIGNATURE_HEX_LEN
            || !signature
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(TokenError::Malformed);
        }
        let presented = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

        // verify_slice compares in constant time
        if self
            .mac_over(name, credential, expires)
            .verify_slice(&presented)
            .is_err()
        {
            tracing::debug!("Rejected session token: bad signature");
            return Err(TokenError::BadSignature);
        }

        let expires_at = parse_compact(expires).ok_or(TokenError::Malformed)?;
        if now > expires_at {
            tracing::debug!(%expires_at, "Rejected session token: expired");
            return Err(TokenError::Expired);
        }

        Ok(TokenClaims {
            principal_name: (*name).to_string(),
            principal_credential: (*credential).to_string(),
            expires_at,
        })
    }

    fn mac_over(&self, name: &str, credential: &str, expires: &str) -> HmacSha256 {
        let mut mac = self.key.mac();
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(credential.as_bytes());
        mac.update(b"|");
        mac.update(expires.as_bytes());
        mac
    }

    fn sign(&self, name: &str, credential: &str, expires: &str) -> String {
        hex::encode(self.mac_over(name, credential, expires).finalize().into_bytes())
    }
}

fn parse_compact(raw: &str) -> Option<DateTime<Utc>> {
    if raw.len() != COMPACT_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, COMPACT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HOUR: std::time::Duration = std::time::Duration::from_secs(3600);

    fn codec() -> SessionTokenCodec {
        SessionTokenCodec::new(SigningKey::new("test-signing-key-0123456789"))
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn decoded(token: &SessionToken) -> String {
        String::from_utf8(ENGINE.decode(token.as_str()).unwrap()).unwrap()
    }

    #[test]
    fn issued_token_verifies_immediately() {
        let codec = codec();
        let token = codec.issue("Jesus Jaramillo", "ab203", HOUR).unwrap();
        let (name, credential) = codec.verify(token.as_str()).unwrap();
        assert_eq!(name, "Jesus Jaramillo");
        assert_eq!(credential, "ab203");
    }

    #[test]
    fn payload_layout_is_four_fields_with_compact_expiry() {
        let token = codec()
            .issue_at("Ana Ruiz", "ab1", HOUR, fixed_now())
            .unwrap();
        let payload = decoded(&token);
        let parts: Vec<&str> = payload.split('|').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "Ana Ruiz");
        assert_eq!(parts[1], "ab1");
        assert_eq!(parts[2], "20250301130000");
        assert_eq!(parts[3].len(), 64);
    }

    #[test]
    fn signature_is_deterministic() {
        let a = codec().issue_at("Ana Ruiz", "ab1", HOUR, fixed_now()).unwrap();
        let b = codec().issue_at("Ana Ruiz", "ab1", HOUR, fixed_now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn claims_carry_expiry() {
        let codec = codec();
        let token = codec.issue_at("Ana Ruiz", "ab1", HOUR, fixed_now()).unwrap();
        let claims = codec.verify_at(token.as_str(), fixed_now()).unwrap();
        assert_eq!(claims.expires_at, fixed_now() + Duration::hours(1));
        assert_eq!(token.expires_at(), claims.expires_at);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let codec = codec();
        let token = codec.issue_at("Ana Ruiz", "ab1", HOUR, fixed_now()).unwrap();
        let at_expiry = fixed_now() + Duration::hours(1);
        assert!(codec.verify_at(token.as_str(), at_expiry).is_ok());
        assert_eq!(
            codec.verify_at(token.as_str(), at_expiry + Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn token_expires_after_lifetime_elapses() {
        let codec = codec();
        let token = codec
            .issue("Ana Ruiz", "ab1", std::time::Duration::from_secs(1))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_secs(2));
        assert_eq!(codec.verify(token.as_str()), Err(TokenError::Expired));
    }

    #[test]
    fn any_payload_flip_breaks_signature() {
        let codec = codec();
        let token = codec.issue_at("Ana Ruiz", "ab1", HOUR, fixed_now()).unwrap();
        let payload = decoded(&token);
        let signed_len = payload.rfind('|').unwrap();

        for i in 0..signed_len {
            let mut bytes = payload.clone().into_bytes();
            if bytes[i] == b'|' {
                continue;
            }
            bytes[i] = if bytes[i] == b'x' { b'y' } else { b'x' };
            let forged = ENGINE.encode(&bytes);
            assert_eq!(
                codec.verify_at(&forged, fixed_now()),
                Err(TokenError::BadSignature),
                "flip at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn extended_expiry_is_rejected_before_parsing() {
        let codec = codec();
        let token = codec.issue_at("Ana Ruiz", "ab1", HOUR, fixed_now()).unwrap();
        let payload = decoded(&token).replace("20250301130000", "20990101000000");
        let forged = ENGINE.encode(payload);
        assert_eq!(
            codec.verify_at(&forged, fixed_now()),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn uppercase_signature_spelling_is_rejected() {
        let codec = codec();
        let token = codec.issue_at("Ana Ruiz", "ab1", HOUR, fixed_now()).unwrap();
        let payload = decoded(&token);
        let (signed, signature) = payload.rsplit_once('|').unwrap();
        assert!(signature.bytes().any(|b| b.is_ascii_lowercase()));

        let respelled = ENGINE.encode(format!("{signed}|{}", signature.to_ascii_uppercase()));
        assert_ne!(respelled, token.as_str());
        assert_eq!(
            codec.verify_at(&respelled, fixed_now()),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn other_key_is_bad_signature() {
        let token = codec().issue("Ana Ruiz", "ab1", HOUR).unwrap();
        let other = SessionTokenCodec::new(SigningKey::new("another-key-0123456789"));
        assert_eq!(other.verify(token.as_str()), Err(TokenError::BadSignature));
    }

    #[test]
    fn truncated_token_is_malformed() {
        let codec = codec();
        let token = codec.issue("Jesus Jaramillo", "ab203", HOUR).unwrap();
        let s = token.as_str();
        let truncated = &s[..s.len() - 4];
        assert_eq!(codec.verify(truncated), Err(TokenError::Malformed));
    }

    #[test]
    fn non_base64_is_malformed() {
        assert_eq!(codec().verify("not base64 at all!"), Err(TokenError::Malformed));
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let codec = codec();
        let three = ENGINE.encode("Ana Ruiz|ab1|20250301130000");
        let five = ENGINE.encode(format!("a|b|c|20250301130000|{}", "0".repeat(64)));
        assert_eq!(codec.verify(&three), Err(TokenError::Malformed));
        assert_eq!(codec.verify(&five), Err(TokenError::Malformed));
    }

    #[test]
    fn separator_in_fields_cannot_be_issued() {
        assert_eq!(
            codec().issue("Ana|Ruiz", "ab1", HOUR),
            Err(TokenError::Unencodable)
        );
        assert_eq!(
            codec().issue("Ana Ruiz", "a|b1", HOUR),
            Err(TokenError::Unencodable)
        );
    }

    #[test]
    fn signed_garbage_expiry_is_malformed() {
        let codec = codec();
        let signature = codec.sign("Ana Ruiz", "ab1", "tomorrow");
        let token = ENGINE.encode(format!("Ana Ruiz|ab1|tomorrow|{signature}"));
        assert_eq!(codec.verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn token_is_printable_cookie_safe_text() {
        let token = codec()
            .issue("José Ñúñez de la Colonia Girasoles", "ab203", HOUR)
            .unwrap();
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=')));
    }

    #[test]
    fn signing_key_debug_is_redacted() {
        let key = SigningKey::new("super-secret");
        assert!(!format!("{key:?}").contains("super-secret"));
    }
}
