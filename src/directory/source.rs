//! Remote directory source.
//!
//! The directory lives in a shared spreadsheet partition whose first row is a
//! header. [`SheetsDirectory`] speaks the spreadsheet values REST API:
//! - `GET  {base}/v4/spreadsheets/{id}/values/{partition}` to list rows
//! - `POST {base}/v4/spreadsheets/{id}/values/{partition}:append` to add one
//!
//! Rows are mapped by header name, so column order in the sheet is free.
//! Missing columns read as empty strings.

use super::table::{parse_timestamp, DirectoryRecord, RecordType};
use crate::config::DirectoryConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header names of the five directory columns, in write order.
pub const COLUMNS: [&str; 5] = ["codigo_qr", "tipo", "colono", "fecha_inicio", "fecha_fin"];

// ── Row model ───────────────────────────────────────────────────

/// A raw directory row as stored remotely (all cells as text).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    pub credential: String,
    /// Source-side type tag (`fijo`, `colono`, `visita`, `peatonal`, ...).
    pub kind: String,
    pub owner_name: String,
    pub valid_from: String,
    pub valid_to: String,
}

impl SourceRow {
    /// Project to a typed record. Rows with an unknown type tag yield `None`.
    pub fn to_record(&self) -> Option<DirectoryRecord> {
        let record_type = RecordType::from_tag(&self.kind)?;
        Some(DirectoryRecord {
            credential: self.credential.clone(),
            record_type,
            owner_name: self.owner_name.clone(),
            valid_from: parse_timestamp(&self.valid_from),
            valid_to: parse_timestamp(&self.valid_to),
        })
    }

    fn into_cells(self) -> Vec<String> {
        vec![
            self.credential,
            self.kind,
            self.owner_name,
            self.valid_from,
            self.valid_to,
        ]
    }
}

// ── Trait ───────────────────────────────────────────────────────

/// Read/append contract of the remote directory.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetch every row of the configured partition.
    async fn list_records(&self) -> Result<Vec<SourceRow>>;

    /// Append one row. Returns `false` when the row could not be stored.
    async fn append_row(&self, row: SourceRow) -> bool;
}

// ── Spreadsheet client ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// HTTP client for a spreadsheet-backed directory.
pub struct SheetsDirectory {
    base_url: reqwest::Url,
    spreadsheet_id: String,
    partition: String,
    api_token: Option<String>,
    http: reqwest::Client,
}

impl SheetsDirectory {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let base_url = reqwest::Url::parse(&config.base_url)
            .with_context(|| format!("Invalid directory base URL: {}", config.base_url))?;
        if config.spreadsheet_id.trim().is_empty() {
            anyhow::bail!("Directory spreadsheet_id is not configured");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            spreadsheet_id: config.spreadsheet_id.clone(),
            partition: config.partition.clone(),
            api_token: config.api_token.clone(),
            http,
        })
    }

    /// URL of the partition's values range, with `suffix` appended to the last segment.
    fn values_url(&self, suffix: &str) -> Result<reqwest::Url> {
        let range = format!("{}{suffix}", self.partition);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Directory base URL cannot be a base"))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn try_append(&self, row: SourceRow) -> Result<()> {
        let mut url = self.values_url(":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let payload = serde_json::json!({ "values": [row.into_cells()] });
        let resp = self
            .authorize(self.http.post(url).json(&payload))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Directory append failed ({status}): {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl DirectorySource for SheetsDirectory {
    async fn list_records(&self) -> Result<Vec<SourceRow>> {
        let url = self.values_url("")?;
        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .context("Directory request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Directory read failed ({status}): {body}");
        }

        let range: ValueRange = resp.json().await.context("Directory returned invalid JSON")?;
        Ok(rows_from_values(range.values))
    }

    async fn append_row(&self, row: SourceRow) -> bool {
        let owner = row.owner_name.clone();
        match self.try_append(row).await {
            Ok(()) => {
                tracing::info!(owner = %owner, "Directory row appended");
                true
            }
            Err(e) => {
                tracing::error!("Failed to append directory row: {e:#}");
                false
            }
        }
    }
}

/// Map a header-first value grid into rows. Rows shorter than the header
/// are padded with empty cells; entirely blank rows are dropped.
fn rows_from_values(values: Vec<Vec<serde_json::Value>>) -> Vec<SourceRow> {
    let mut grid = values.into_iter();
    let Some(header) = grid.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header.iter().map(|v| cell_text(v).trim().to_lowercase()).collect();
    let position = |name: &str| header.iter().position(|h| h == name);
    let [credential, kind, owner, from, to] = COLUMNS.map(position);

    grid.filter(|row| row.iter().any(|v| !cell_text(v).trim().is_empty()))
        .map(|row| {
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| row.get(i))
                    .map(cell_text)
                    .unwrap_or_default()
            };
            SourceRow {
                credential: cell(credential),
                kind: cell(kind),
                owner_name: cell(owner),
                valid_from: cell(from),
                valid_to: cell(to),
            }
        })
        .collect()
}

/// Render a JSON cell as text; numeric credentials arrive unquoted.
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> DirectoryConfig {
        DirectoryConfig {
            base_url: base_url.into(),
            spreadsheet_id: "sheet123".into(),
            partition: "ControlAccesoQR".into(),
            api_token: Some("tok".into()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn rows_map_by_header_name() {
        let rows = rows_from_values(vec![
            vec![json!("colono"), json!("tipo"), json!("codigo_qr")],
            vec![json!("Jesus Jaramillo"), json!("fijo"), json!(203)],
            vec![json!(""), json!(""), json!("")],
            vec![json!("Ana Ruiz"), json!("colono")],
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].credential, "203");
        assert_eq!(rows[0].owner_name, "Jesus Jaramillo");
        assert_eq!(rows[0].valid_from, "");
        assert_eq!(rows[1].credential, "");
    }

    #[test]
    fn empty_grid_yields_no_rows() {
        assert!(rows_from_values(Vec::new()).is_empty());
    }

    #[test]
    fn unknown_kind_has_no_record() {
        let row = SourceRow {
            kind: "proveedor".into(),
            ..SourceRow::default()
        };
        assert!(row.to_record().is_none());
    }

    #[test]
    fn values_url_encodes_partition() {
        let mut config = test_config("https://sheets.example.com/");
        config.partition = "Control Acceso".into();
        let dir = SheetsDirectory::new(&config).unwrap();
        let url = dir.values_url(":append").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet123/values/Control%20Acceso:append"
        );
    }

    #[test]
    fn missing_spreadsheet_id_is_rejected() {
        let mut config = test_config("https://sheets.example.com");
        config.spreadsheet_id = " ".into();
        assert!(SheetsDirectory::new(&config).is_err());
    }

    #[tokio::test]
    async fn list_records_reads_value_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet123/values/ControlAccesoQR"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "ControlAccesoQR!A1:E3",
                "values": [
                    ["codigo_qr", "tipo", "colono", "fecha_inicio", "fecha_fin"],
                    ["ab203", "fijo", "Jesus Jaramillo", "", ""],
                    ["QRjuanab203", "visita", "Jesus Jaramillo", "2025-03-01 13:00:00", "2025-03-01 22:00:00"]
                ]
            })))
            .mount(&server)
            .await;

        let dir = SheetsDirectory::new(&test_config(&server.uri())).unwrap();
        let rows = dir.list_records().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, "fijo");
        assert_eq!(rows[1].to_record().unwrap().record_type, RecordType::VisitorPass);
    }

    #[tokio::test]
    async fn list_records_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let dir = SheetsDirectory::new(&test_config(&server.uri())).unwrap();
        let err = dir.list_records().await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn append_row_posts_cells_in_column_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet123/values/ControlAccesoQR:append"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_json(json!({
                "values": [["QRanaab1", "visita", "Ana Ruiz", "2025-03-01 12:00:00", "2025-03-01 23:00:00"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = SheetsDirectory::new(&test_config(&server.uri())).unwrap();
        let stored = dir
            .append_row(SourceRow {
                credential: "QRanaab1".into(),
                kind: "visita".into(),
                owner_name: "Ana Ruiz".into(),
                valid_from: "2025-03-01 12:00:00".into(),
                valid_to: "2025-03-01 23:00:00".into(),
            })
            .await;
        assert!(stored);
    }

    #[tokio::test]
    async fn append_row_reports_failure_as_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = SheetsDirectory::new(&test_config(&server.uri())).unwrap();
        assert!(!dir.append_row(SourceRow::default()).await);
    }
}
