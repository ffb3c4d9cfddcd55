//! Tushare Pro HTTP client
//!
//! Every Tushare API is a `POST` of the same JSON envelope:
//!
//! ```text
//! {"api_name": "trade_cal", "token": "...", "params": {...}, "fields": ""}
//! ```
//!
//! and answers with
//!
//! ```text
//! {"code": 0, "msg": "", "data": {"fields": ["exchange", "cal_date"], "items": [["SSE", "20080101"]]}}
//! ```
//!
//! This client does exactly one HTTP request per [`Provider::query`]. Throttling
//! and retries belong to the ingestion pipeline, not the transport.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::retry_formatter::classify_transport_error;
use super::{Provider, ProviderError, ProviderResult};
use crate::{CallParams, RowSet, Value};

/// Public Tushare Pro endpoint
pub const TUSHARE_API_URL: &str = "http://api.tushare.pro";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body kept in [`ProviderError::Http`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: &'a CallParams,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<Value>>,
}

/// HTTP client for the Tushare Pro API
pub struct TushareClient {
    client: Arc<Client>,
    base_url: String,
    token: String,
}

impl TushareClient {
    /// Create a client against the public endpoint
    pub fn new(token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(Arc::new(client), TUSHARE_API_URL, token)
    }

    /// Create a client with a shared HTTP client and custom endpoint
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (Arc for cheap cloning)
    /// * `base_url` - Endpoint URL
    /// * `token` - Account token
    pub fn with_client(
        client: Arc<Client>,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Endpoint URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token prefix safe to show in logs
    pub fn redacted_token(&self) -> String {
        let prefix: String = self.token.chars().take(4).collect();
        format!("{prefix}***")
    }
}

impl std::fmt::Debug for TushareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TushareClient")
            .field("base_url", &self.base_url)
            .field("token", &self.redacted_token())
            .finish()
    }
}

#[async_trait]
impl Provider for TushareClient {
    async fn query(&self, api_name: &str, params: &CallParams) -> ProviderResult<RowSet> {
        let request = ApiRequest {
            api_name,
            token: &self.token,
            params,
            fields: "",
        };

        debug!(
            api = api_name,
            params = %params,
            token = %self.redacted_token(),
            "Calling Tushare API"
        );

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                kind: classify_transport_error(&e),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ProviderError::Network {
            kind: classify_transport_error(&e),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let rows = parse_response(&body)?;
        debug!(api = api_name, rows = rows.len(), "Tushare API returned");
        Ok(rows)
    }

    fn name(&self) -> &str {
        "tushare"
    }
}

/// Decode a Tushare response body into a row set
///
/// # Errors
/// [`ProviderError::Api`] when `code` is non-zero, [`ProviderError::Parse`]
/// when the body is not a well-formed envelope.
pub fn parse_response(body: &str) -> ProviderResult<RowSet> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("invalid response body: {e}")))?;

    if response.code != 0 {
        return Err(ProviderError::Api {
            code: response.code,
            message: response.msg.unwrap_or_default(),
        });
    }

    let data = response
        .data
        .ok_or_else(|| ProviderError::Parse("response has no data section".to_string()))?;

    RowSet::new(data.fields, data.items).map_err(|e| ProviderError::Parse(e.to_string()))
}
