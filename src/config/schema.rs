//! Configuration schema. Every section falls back to defaults when absent.

use crate::session::SigningKey;
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum signing key length in bytes.
pub const MIN_SECRET_LEN: usize = 16;

const DEFAULT_PARTITION: &str = "ControlAccesoQR";
const DEFAULT_CACHE_FILE: &str = "cache_colonos.json";
const DEFAULT_LIFETIME_SECS: u64 = 7 * 24 * 3600;

/// Upper bound on the session lifetime (10 years).
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub directory: DirectoryConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
    pub visitors: VisitorConfig,
}

impl Config {
    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("COLONOS_DIRECTORY_URL") {
            self.directory.base_url = url;
        }
        if let Some(token) = non_empty("COLONOS_DIRECTORY_TOKEN") {
            self.directory.api_token = Some(token);
        }
        if let Some(secret) = non_empty("COLONOS_SESSION_SECRET") {
            self.session.secret_key = secret;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.secret_key.len() < MIN_SECRET_LEN {
            bail!(
                "session.secret_key must be at least {MIN_SECRET_LEN} bytes \
                 (set COLONOS_SESSION_SECRET or run `colonos keygen`)"
            );
        }
        if self.session.lifetime_secs == 0 {
            bail!("session.lifetime_secs must be greater than zero");
        }
        if self.session.lifetime_secs > MAX_LIFETIME_SECS {
            bail!("session.lifetime_secs must not exceed {MAX_LIFETIME_SECS} (10 years)");
        }
        if self.directory.timeout_secs == 0 {
            bail!("directory.timeout_secs must be greater than zero");
        }
        self.visitors.timezone()?;
        let (opens, closes) = self.visitors.gate_window()?;
        if opens >= closes {
            bail!("visitors.gate_opens must be earlier than visitors.gate_closes");
        }
        Ok(())
    }
}

// ── Directory ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Spreadsheet API root (e.g. https://sheets.googleapis.com).
    pub base_url: String,
    pub spreadsheet_id: String,
    /// Sheet (partition) holding the directory rows.
    pub partition: String,
    /// Bearer token for the spreadsheet API.
    pub api_token: Option<String>,
    /// Bound on each remote read, in seconds.
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com".into(),
            spreadsheet_id: String::new(),
            partition: DEFAULT_PARTITION.into(),
            api_token: None,
            timeout_secs: 10,
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Cache ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let path = super::project_dirs()
            .map(|dirs| dirs.data_dir().join(DEFAULT_CACHE_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE));
        Self { path }
    }
}

// ── Session ─────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC signing secret. Keep it out of version control.
    pub secret_key: String,
    pub lifetime_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            lifetime_secs: DEFAULT_LIFETIME_SECS,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret_key", &"<redacted>")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish()
    }
}

impl SessionConfig {
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::new(self.secret_key.as_bytes())
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

// ── Visitors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitorConfig {
    /// IANA timezone that defines "today" for visit dates.
    pub timezone: String,
    /// Earliest allowed visit time, `HH:MM`.
    pub gate_opens: String,
    /// Latest allowed visit time, `HH:MM`.
    pub gate_closes: String,
    pub vehicle_days_ahead: u32,
    pub pedestrian_days_ahead: u32,
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Mexico_City".into(),
            gate_opens: "06:00".into(),
            gate_closes: "23:00".into(),
            vehicle_days_ahead: 60,
            pedestrian_days_ahead: 30,
        }
    }
}

impl VisitorConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid visitors.timezone '{}': {e}", self.timezone))
    }

    pub fn gate_window(&self) -> Result<(NaiveTime, NaiveTime)> {
        let parse = |raw: &str, field: &str| {
            NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .with_context(|| format!("Invalid visitors.{field} '{raw}', expected HH:MM"))
        };
        Ok((
            parse(&self.gate_opens, "gate_opens")?,
            parse(&self.gate_closes, "gate_closes")?,
        ))
    }
}
