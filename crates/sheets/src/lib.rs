//! Catalog source: fetches the rental sheet through the Google Sheets v4
//! values endpoint and exposes it as a header-keyed [`RawTable`].

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use rentatool_core::catalog::RawTable;
use rentatool_core::config::SheetsConfig;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("sheet fetch transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sheet fetch rejected with status {0}")]
    Status(reqwest::StatusCode),
    #[error("sheet response carried no rows")]
    EmptyValues,
}

/// Anything that can produce the raw catalog table. The refresh task talks to
/// this seam so tests can feed it canned tables.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_raw_table(&self) -> Result<RawTable, SheetError>;
}

pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    spreadsheet_id: String,
    range: String,
}

impl SheetsClient {
    pub fn new(config: &SheetsConfig) -> Result<Self, SheetError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
        })
    }

    fn values_url(&self) -> String {
        format!("{}/{}/values/{}", self.base_url, self.spreadsheet_id, self.range)
    }
}

#[async_trait]
impl CatalogSource for SheetsClient {
    async fn fetch_raw_table(&self) -> Result<RawTable, SheetError> {
        let response = self
            .http
            .get(self.values_url())
            .query(&[("key", self.api_key.expose_secret())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::Status(status));
        }

        let payload: ValuesResponse = response.json().await?;
        let table = table_from_values(payload.values.unwrap_or_default())?;
        debug!(rows = table.rows.len(), "fetched catalog sheet");
        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Option<Vec<Vec<String>>>,
}

/// First row is the header; data rows are padded to the header width since
/// the API truncates trailing empty cells.
fn table_from_values(mut values: Vec<Vec<String>>) -> Result<RawTable, SheetError> {
    if values.is_empty() {
        return Err(SheetError::EmptyValues);
    }
    let headers: Vec<String> =
        values.remove(0).into_iter().map(|header| header.trim().to_string()).collect();
    let width = headers.len();
    for row in &mut values {
        row.resize(width, String::new());
    }
    Ok(RawTable::new(headers, values))
}
