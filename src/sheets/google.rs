//! Google Sheets v4 client
//!
//! Writes single cells with `spreadsheets.values.update`. When only a
//! spreadsheet title is configured, the id is looked up once through the
//! Drive files listing (the same search an "open by title" performs) and
//! remembered for the lifetime of the client.

use crate::config::SpreadsheetRef;
use crate::layout::{a1_range, CellAddress};
use crate::sheets::auth::TokenProvider;
use crate::sheets::client::{SheetClient, SheetError};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Google Sheets client configuration
#[derive(Debug, Clone)]
pub struct GoogleSheetsConfig {
    pub spreadsheet: SpreadsheetRef,
    /// Worksheet (tab) all cells are written to
    pub worksheet: String,
    pub sheets_base_url: String,
    pub drive_base_url: String,
    pub timeout: Duration,
}

impl GoogleSheetsConfig {
    pub fn new(spreadsheet: SpreadsheetRef, worksheet: impl Into<String>) -> Self {
        Self {
            spreadsheet,
            worksheet: worksheet.into(),
            sheets_base_url: "https://sheets.googleapis.com".to_string(),
            drive_base_url: "https://www.googleapis.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Google Sheets client authenticated as a service account
pub struct GoogleSheetsClient {
    config: GoogleSheetsConfig,
    client: Client,
    tokens: Arc<TokenProvider>,
    spreadsheet_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: String,
}

impl GoogleSheetsClient {
    /// Create a client; the HTTP client is shared with the token provider
    pub fn new(
        config: GoogleSheetsConfig,
        client: Client,
        tokens: Arc<TokenProvider>,
    ) -> Self {
        let spreadsheet_id = match &config.spreadsheet {
            SpreadsheetRef::Id(id) => OnceCell::new_with(Some(id.clone())),
            SpreadsheetRef::Name(_) => OnceCell::new(),
        };

        Self {
            config,
            client,
            tokens,
            spreadsheet_id,
        }
    }

    /// Build an HTTP client with the configured timeout
    pub fn http_client(timeout: Duration) -> Result<Client, SheetError> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SheetError::NetworkError(e.to_string()))
    }

    /// Resolve (and remember) the spreadsheet id
    pub async fn spreadsheet_id(&self) -> Result<&str, SheetError> {
        self.spreadsheet_id
            .get_or_try_init(|| async {
                match &self.config.spreadsheet {
                    SpreadsheetRef::Id(id) => Ok(id.clone()),
                    SpreadsheetRef::Name(name) => self.find_spreadsheet_by_name(name).await,
                }
            })
            .await
            .map(String::as_str)
    }

    async fn find_spreadsheet_by_name(&self, name: &str) -> Result<String, SheetError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            name.replace('\\', "\\\\").replace('\'', "\\'"),
            SPREADSHEET_MIME_TYPE
        );

        let url = build_url(&self.config.drive_base_url, &["drive", "v3", "files"])?;
        let response = self
            .authorized(Method::GET, url)
            .await?
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(|e| SheetError::NetworkError(format!("drive lookup failed: {e}")))?;

        let list: DriveFileList = Self::read_json(response).await?;
        match list.files.into_iter().next() {
            Some(file) => {
                info!("Spreadsheet '{}' resolved to id {}", file.name, file.id);
                Ok(file.id)
            }
            None => {
                warn!(
                    "No spreadsheet named '{}' is shared with {}",
                    name,
                    self.tokens.client_email()
                );
                Err(SheetError::SpreadsheetNotFound(name.to_string()))
            }
        }
    }

    /// Titles of the worksheets (tabs) in the spreadsheet
    pub async fn worksheet_titles(&self) -> Result<Vec<String>, SheetError> {
        let id = self.spreadsheet_id().await?;
        let url = build_url(&self.config.sheets_base_url, &["v4", "spreadsheets", id])?;
        let response = self
            .authorized(Method::GET, url)
            .await?
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await
            .map_err(|e| SheetError::NetworkError(format!("metadata request failed: {e}")))?;

        let metadata: SpreadsheetMetadata = Self::read_json(response).await?;
        Ok(metadata
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    async fn authorized(
        &self,
        method: Method,
        url: Url,
    ) -> Result<reqwest::RequestBuilder, SheetError> {
        let token = self.tokens.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    /// Turn a response into JSON or a typed error
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SheetError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SheetError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| SheetError::ApiError {
            status: status.as_u16(),
            message: format!("unexpected response body: {e}"),
        })
    }
}

#[async_trait]
impl SheetClient for GoogleSheetsClient {
    fn name(&self) -> &str {
        "google_sheets"
    }

    fn worksheet(&self) -> &str {
        &self.config.worksheet
    }

    async fn update_cell(
        &self,
        cell: &CellAddress,
        value: &serde_json::Value,
    ) -> Result<(), SheetError> {
        let id = self.spreadsheet_id().await?;
        let range = a1_range(&self.config.worksheet, cell);
        let url = build_url(
            &self.config.sheets_base_url,
            &["v4", "spreadsheets", id, "values", range.as_str()],
        )?;

        debug!("Writing {} to {}", value, range);

        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });

        let response = self
            .authorized(Method::PUT, url)
            .await?
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body)
            .send()
            .await
            .map_err(|e| SheetError::NetworkError(format!("values update failed: {e}")))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // token revoked or expired early; the next request fetches a new one
            self.tokens.invalidate().await;
        }

        let _: serde_json::Value = Self::read_json(response).await.map_err(|e| {
            error!("Failed to write {}: {}", range, e);
            e
        })?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SheetError> {
        let titles = self.worksheet_titles().await?;
        if titles.iter().any(|t| t == &self.config.worksheet) {
            Ok(())
        } else {
            Err(SheetError::WorksheetNotFound(self.config.worksheet.clone()))
        }
    }
}

/// Append percent-encoded path segments to a base URL
fn build_url(base: &str, segments: &[&str]) -> Result<Url, SheetError> {
    let mut url = Url::parse(base)
        .map_err(|e| SheetError::NetworkError(format!("invalid base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| SheetError::NetworkError(format!("base URL '{base}' cannot hold a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn api_error(status: StatusCode, body: &str) -> SheetError {
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SheetError::AuthFailed(format!("{status}: {message}"))
        }
        _ => SheetError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}
