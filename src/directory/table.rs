//! Directory records and the resolved, resident-only lookup table.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layouts accepted from the directory, most specific first.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

// ── Record type ─────────────────────────────────────────────────

/// Canonical record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// A resident with a standing personal credential.
    Resident,
    /// A visitor pass (vehicle or pedestrian) registered by a resident.
    VisitorPass,
}

impl RecordType {
    /// Normalize a source-side type tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "fijo" | "colono" | "resident" => Some(Self::Resident),
            "visita" | "peatonal" | "visitor" => Some(Self::VisitorPass),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::VisitorPass => "visitor_pass",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Records ─────────────────────────────────────────────────────

/// One directory row after projection to the five required columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Personal credential (the resident's access code).
    pub credential: String,
    pub record_type: RecordType,
    /// Display name as written in the directory.
    pub owner_name: String,
    #[serde(default)]
    pub valid_from: Option<NaiveDateTime>,
    #[serde(default)]
    pub valid_to: Option<NaiveDateTime>,
}

/// Lookup-key normalization shared by names and credentials: trim, then lowercase.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parse a directory timestamp. Blank or unrecognized values yield `None`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ── Table ───────────────────────────────────────────────────────

/// Ordered, resident-only directory snapshot.
///
/// A table is built once and never mutated; refreshing produces a new one.
/// Duplicate owner names are kept in source order and the first one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TableSnapshot")]
pub struct DirectoryTable {
    records: Vec<DirectoryRecord>,
}

/// Serialized form; deserialization goes through [`DirectoryTable::from_records`].
#[derive(Deserialize)]
struct TableSnapshot {
    #[serde(default)]
    records: Vec<DirectoryRecord>,
}

impl From<TableSnapshot> for DirectoryTable {
    fn from(snapshot: TableSnapshot) -> Self {
        Self::from_records(snapshot.records)
    }
}

impl DirectoryTable {
    /// Build a table, keeping only resident records in their original order.
    pub fn from_records(records: impl IntoIterator<Item = DirectoryRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .filter(|r| r.record_type == RecordType::Resident)
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DirectoryRecord] {
        &self.records
    }

    /// First record whose normalized owner name equals the normalized `name`.
    pub fn find_owner(&self, name: &str) -> Option<&DirectoryRecord> {
        let key = normalize(name);
        self.records.iter().find(|r| normalize(&r.owner_name) == key)
    }

    /// Trimmed credential of the first principal matching `name`.
    pub fn credential_for(&self, name: &str) -> Option<String> {
        self.find_owner(name).map(|r| r.credential.trim().to_string())
    }
}

#[cfg(test)]
pub(crate) fn resident(owner_name: &str, credential: &str) -> DirectoryRecord {
    DirectoryRecord {
        credential: credential.into(),
        record_type: RecordType::Resident,
        owner_name: owner_name.into(),
        valid_from: None,
        valid_to: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_synonyms_normalize() {
        assert_eq!(RecordType::from_tag("fijo"), Some(RecordType::Resident));
        assert_eq!(RecordType::from_tag(" Colono "), Some(RecordType::Resident));
        assert_eq!(RecordType::from_tag("visita"), Some(RecordType::VisitorPass));
        assert_eq!(RecordType::from_tag("peatonal"), Some(RecordType::VisitorPass));
        assert_eq!(RecordType::from_tag("proveedor"), None);
    }

    #[test]
    fn table_keeps_only_residents_in_order() {
        let mut pass = resident("Ana Ruiz", "QRjuanab1");
        pass.record_type = RecordType::VisitorPass;
        let table = DirectoryTable::from_records(vec![
            resident("Ana Ruiz", "ab1"),
            pass,
            resident("Luis Mora", "lm7"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].owner_name, "Ana Ruiz");
        assert_eq!(table.records()[1].owner_name, "Luis Mora");
    }

    #[test]
    fn find_owner_is_case_and_whitespace_insensitive() {
        let table = DirectoryTable::from_records(vec![resident("Jesus Jaramillo", "ab203")]);
        assert!(table.find_owner("  jesus jaramillo ").is_some());
        assert!(table.find_owner("JESUS JARAMILLO").is_some());
        assert!(table.find_owner("jesus").is_none());
    }

    #[test]
    fn duplicate_names_resolve_to_first_record() {
        let table = DirectoryTable::from_records(vec![
            resident("Ana Ruiz", "first"),
            resident("ana ruiz", "second"),
        ]);
        assert_eq!(table.credential_for("ANA RUIZ").as_deref(), Some("first"));
    }

    #[test]
    fn credential_for_trims_stored_value() {
        let table = DirectoryTable::from_records(vec![resident("Ana Ruiz", "  ab1 ")]);
        assert_eq!(table.credential_for("ana ruiz").as_deref(), Some("ab1"));
        assert!(table.credential_for("nobody").is_none());
    }

    #[test]
    fn timestamps_parse_common_layouts() {
        assert!(parse_timestamp("2025-03-01 13:00:00").is_some());
        assert!(parse_timestamp("2025-03-01 13:00").is_some());
        assert_eq!(
            parse_timestamp("2025-03-01"),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert!(parse_timestamp("   ").is_none());
        assert!(parse_timestamp("mañana").is_none());
    }
}
