//! Google Sheets v4 REST backend.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::sync::OnceCell;
use tracing::{info, info_span, warn, Instrument};

use crate::{GatewayError, RangeSpec, Rgb, TableGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub access_token: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub backoff: BackoffPolicy,
}

impl SheetsConfig {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            api_base: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

fn cell_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate(body: String) -> String {
    const LIMIT: usize = 300;
    if body.len() <= LIMIT {
        return body;
    }
    let mut cut = LIMIT;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}

/// Worksheet-bound gateway over the Sheets REST API, authenticated with a bearer token.
#[derive(Debug)]
pub struct GoogleSheetsGateway {
    client: reqwest::Client,
    config: SheetsConfig,
    sheet_id: OnceCell<i64>,
}

impl GoogleSheetsGateway {
    pub fn new(config: SheetsConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;
        Url::parse(&config.api_base)
            .with_context(|| format!("parsing sheets api base {}", config.api_base))?;

        Ok(Self {
            client,
            config,
            sheet_id: OnceCell::new(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| GatewayError::InvalidRange(format!("api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidRange("api base cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        op: &'static str,
        method: Method,
        url: Url,
        body: Option<JsonValue>,
    ) -> Result<reqwest::Response, GatewayError> {
        let span = info_span!("sheets_request", op, spreadsheet = %self.config.spreadsheet_id);
        async {
            let backoff = self.config.backoff;
            let mut last_error: Option<GatewayError> = None;

            for attempt in 0..=backoff.max_retries {
                let mut request = self
                    .client
                    .request(method.clone(), url.clone())
                    .bearer_auth(&self.config.access_token);
                if let Some(body) = &body {
                    request = request.json(body);
                }

                match request.send().await {
                    Ok(resp) if resp.status().is_success() => return Ok(resp),
                    Ok(resp) => {
                        let status = resp.status();
                        let error = GatewayError::HttpStatus {
                            status: status.as_u16(),
                            url: resp.url().to_string(),
                            body: truncate(resp.text().await.unwrap_or_default()),
                        };
                        if classify_status(status) == RetryDisposition::Retryable
                            && attempt < backoff.max_retries
                        {
                            warn!(status = status.as_u16(), attempt, "retrying sheets request");
                            last_error = Some(error);
                            tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
                            continue;
                        }
                        return Err(error);
                    }
                    Err(err) => {
                        if classify_reqwest_error(&err) == RetryDisposition::Retryable
                            && attempt < backoff.max_retries
                        {
                            warn!(error = %err, attempt, "retrying sheets request");
                            last_error = Some(GatewayError::Request(err));
                            tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
                            continue;
                        }
                        return Err(GatewayError::Request(err));
                    }
                }
            }

            Err(last_error
                .unwrap_or_else(|| GatewayError::Decode("no request attempted".to_string())))
        }
        .instrument(span)
        .await
    }

    /// Numeric id of the bound worksheet, looked up once by title.
    async fn sheet_id(&self) -> Result<i64, GatewayError> {
        self.sheet_id
            .get_or_try_init(|| async {
                let mut url = self.url(&[&self.config.spreadsheet_id])?;
                url.query_pairs_mut().append_pair("fields", "sheets.properties");
                let meta: SpreadsheetMeta = self
                    .send("spreadsheet_meta", Method::GET, url, None)
                    .await?
                    .json()
                    .await?;
                meta.sheets
                    .into_iter()
                    .find(|s| s.properties.title == self.config.worksheet)
                    .map(|s| s.properties.sheet_id)
                    .ok_or_else(|| GatewayError::WorksheetNotFound(self.config.worksheet.clone()))
            })
            .await
            .copied()
    }

    async fn batch_update(&self, op: &'static str, request: JsonValue) -> Result<(), GatewayError> {
        let url = self.url(&[&format!("{}:batchUpdate", self.config.spreadsheet_id)])?;
        self.send(op, Method::POST, url, Some(json!({ "requests": [request] })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TableGateway for GoogleSheetsGateway {
    fn table_id(&self) -> String {
        format!("{}/{}", self.config.spreadsheet_id, self.config.worksheet)
    }

    async fn read_range(&self, range: &RangeSpec) -> Result<Vec<Vec<String>>, GatewayError> {
        range.validate()?;
        let a1 = range.to_a1(&self.config.worksheet);
        let mut url = self.url(&[&self.config.spreadsheet_id, "values", &a1])?;
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        let body: ValueRange = self
            .send("values_get", Method::GET, url, None)
            .await?
            .json()
            .await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn update_range(
        &self,
        range: &RangeSpec,
        values: Vec<Vec<String>>,
    ) -> Result<(), GatewayError> {
        range.validate()?;
        let a1 = range.to_a1(&self.config.worksheet);
        let mut url = self.url(&[&self.config.spreadsheet_id, "values", &a1])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": a1, "majorDimension": "ROWS", "values": values });
        self.send("values_update", Method::PUT, url, Some(body))
            .await?;
        info!(range = %a1, "range updated");
        Ok(())
    }

    async fn insert_row_at(&self, index: u32) -> Result<(), GatewayError> {
        let sheet_id = self.sheet_id().await?;
        self.batch_update(
            "insert_row",
            json!({
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": index,
                        "endIndex": index + 1
                    },
                    "inheritFromBefore": false
                }
            }),
        )
        .await?;
        info!(index, "row inserted");
        Ok(())
    }

    async fn highlight_row(&self, row: u32, color: Rgb) -> Result<(), GatewayError> {
        if row == 0 {
            return Err(GatewayError::InvalidRange("row 0".to_string()));
        }
        let sheet_id = self.sheet_id().await?;
        self.batch_update(
            "highlight_row",
            json!({
                "repeatCell": {
                    "range": {
                        "sheetId": sheet_id,
                        "startRowIndex": row - 1,
                        "endRowIndex": row
                    },
                    "cell": { "userEnteredFormat": { "backgroundColor": color } },
                    "fields": "userEnteredFormat.backgroundColor"
                }
            }),
        )
        .await
    }
}
