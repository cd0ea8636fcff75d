//! Google Sheets v4 REST backend.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::BackendError;
use crate::sheets::backend::{SpreadsheetBackend, SpreadsheetHandle, ValueInput};
use crate::sheets::credential::CredentialResolver;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header styling: white bold text on blue, centred.
const HEADER_BACKGROUND: (f32, f32, f32) = (0.2, 0.4, 0.8);

pub struct GoogleSheetsBackend {
    client: Client,
    api_base: Url,
    credentials: CredentialResolver,
    token: RwLock<Option<String>>,
}

fn map_http_error(error: reqwest::Error) -> BackendError {
    if let Some(status) = error.status() {
        map_status(status.as_u16(), error.to_string())
    } else if error.is_timeout() {
        BackendError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        BackendError::Transport(format!("Connection error: {}", error))
    } else {
        BackendError::Transport(format!("HTTP error: {}", error))
    }
}

fn map_status(status: u16, body: String) -> BackendError {
    match status {
        401 | 403 => BackendError::Auth(body),
        _ => BackendError::Rejected {
            status,
            message: body,
        },
    }
}

impl GoogleSheetsBackend {
    pub fn new(
        credentials: CredentialResolver,
        api_base: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        let base = api_base.unwrap_or(DEFAULT_API_BASE);
        let api_base = Url::parse(base)
            .map_err(|e| BackendError::Transport(format!("Invalid API base '{}': {}", base, e)))?;
        Ok(Self {
            client,
            api_base,
            credentials,
            token: RwLock::new(None),
        })
    }

    fn token(&self) -> Result<String, BackendError> {
        if let Some(token) = self.token.read().as_ref() {
            return Ok(token.clone());
        }
        let token = self.credentials.resolve()?;
        *self.token.write() = Some(token.clone());
        Ok(token)
    }

    /// `{api_base}/v4/spreadsheets/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.api_base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::Transport("API base cannot be a base URL".to_string()))?;
            path.pop_if_empty().push("v4").push("spreadsheets");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: &Value) -> Result<Value, BackendError> {
        let token = self.token()?;
        debug!(method = %method, url = %url, "Sheets API request");
        let response = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            if matches!(status.as_u16(), 401 | 403) {
                // Drop the cached token so a refreshed one is picked up next time.
                *self.token.write() = None;
            }
            return Err(map_status(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to parse response: {}", e)))
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<Value, BackendError> {
        let url = self.endpoint(&[&format!("{}:batchUpdate", spreadsheet_id)])?;
        self.send(Method::POST, url, &json!({ "requests": requests }))
            .await
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
}

#[async_trait]
impl SpreadsheetBackend for GoogleSheetsBackend {
    async fn authenticate(&self) -> Result<(), BackendError> {
        self.token().map(|_| ())
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<SpreadsheetHandle, BackendError> {
        let url = self.endpoint(&[])?;
        let body = json!({ "properties": { "title": title } });
        let created: CreatedSpreadsheet = serde_json::from_value(self.send(Method::POST, url, &body).await?)
            .map_err(|e| BackendError::Transport(format!("Unexpected create response: {}", e)))?;
        Ok(SpreadsheetHandle {
            spreadsheet_id: created.spreadsheet_id,
            default_sheet_id: created.sheets.first().map(|s| s.properties.sheet_id),
        })
    }

    async fn add_sheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<i64, BackendError> {
        let reply = self
            .batch_update(
                spreadsheet_id,
                vec![json!({
                    "addSheet": {
                        "properties": {
                            "title": title,
                            "gridProperties": { "rowCount": rows, "columnCount": columns }
                        }
                    }
                })],
            )
            .await?;
        reply["replies"][0]["addSheet"]["properties"]["sheetId"]
            .as_i64()
            .ok_or_else(|| {
                BackendError::Transport("addSheet reply did not include a sheetId".to_string())
            })
    }

    async fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<(), BackendError> {
        self.batch_update(
            spreadsheet_id,
            vec![json!({
                "updateSheetProperties": {
                    "properties": {
                        "sheetId": sheet_id,
                        "title": title,
                        "gridProperties": { "rowCount": rows, "columnCount": columns }
                    },
                    "fields": "title,gridProperties.rowCount,gridProperties.columnCount"
                }
            })],
        )
        .await
        .map(|_| ())
    }

    async fn write_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
        input: ValueInput,
    ) -> Result<(), BackendError> {
        let mut url = self.endpoint(&[spreadsheet_id, "values", range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", input.as_str());
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": values });
        self.send(Method::PUT, url, &body).await.map(|_| ())
    }

    async fn format_header(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        column_count: u32,
    ) -> Result<(), BackendError> {
        let (red, green, blue) = HEADER_BACKGROUND;
        let requests = vec![
            json!({
                "repeatCell": {
                    "range": { "sheetId": sheet_id, "startRowIndex": 0, "endRowIndex": 1 },
                    "cell": {
                        "userEnteredFormat": {
                            "backgroundColor": { "red": red, "green": green, "blue": blue },
                            "textFormat": {
                                "foregroundColor": { "red": 1.0, "green": 1.0, "blue": 1.0 },
                                "bold": true
                            },
                            "horizontalAlignment": "CENTER"
                        }
                    },
                    "fields": "userEnteredFormat(backgroundColor,textFormat,horizontalAlignment)"
                }
            }),
            json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": sheet_id, "gridProperties": { "frozenRowCount": 1 } },
                    "fields": "gridProperties.frozenRowCount"
                }
            }),
            json!({
                "autoResizeDimensions": {
                    "dimensions": {
                        "sheetId": sheet_id,
                        "dimension": "COLUMNS",
                        "startIndex": 0,
                        "endIndex": column_count
                    }
                }
            }),
        ];
        self.batch_update(spreadsheet_id, requests).await.map(|_| ())
    }

    fn backend_name(&self) -> &str {
        "google-sheets"
    }
}
