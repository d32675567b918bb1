//! Thin client for the handful of Immich endpoints the slideshow needs.
//!
//! Every call is authenticated with the `x-api-key` header. HTTP 401 maps to
//! [`ApiError::Auth`]; any other non-200 status, transport failure or
//! undecodable body maps to [`ApiError::Remote`].

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

pub use reqwest::Method;

use crate::config::Configuration;
use crate::error::{ApiError, Result, detail_map};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const METADATA_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct ImmichClient {
    http: Client,
    base_url: String,
}

/// Asset returned by `POST /api/search/random`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomAsset {
    pub id: String,
    pub local_date_time: String,
}

/// Body of `POST /api/search/metadata`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataQuery {
    pub taken_after: String,
    pub taken_before: String,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Value>,
}

impl MetadataQuery {
    pub fn new(taken_after: impl Into<String>, taken_before: impl Into<String>) -> Self {
        Self {
            taken_after: taken_after.into(),
            taken_before: taken_before.into(),
            size: METADATA_PAGE_SIZE,
            page: None,
        }
    }

    /// Same window, pointed at the page named by `token`.
    pub fn at_page(&self, token: &str) -> Self {
        let page = match token.parse::<u64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(token),
        };
        Self {
            page: Some(page),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    pub assets: AssetPage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPage {
    #[serde(default)]
    pub items: Vec<AssetItem>,
    #[serde(default)]
    pub next_page: Option<Value>,
}

impl AssetPage {
    /// The server sends the next page as a string, older versions as a number.
    pub fn next_page_token(&self) -> Option<String> {
        match self.next_page.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetItem {
    pub id: String,
    pub local_date_time: String,
    #[serde(default)]
    pub original_file_name: String,
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub original_mime_type: Option<String>,
}

/// Response of `GET /api/assets/{id}`; only the EXIF block is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    #[serde(default)]
    pub exif_info: Option<ExifInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ExifInfo {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ImmichClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| ApiError::remote("api key contains characters not allowed in a header"))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &Configuration) -> Result<Self> {
        Self::new(&cfg.server_url, cfg.api_key.expose(), cfg.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issues one request and decodes the JSON reply.
    #[instrument(skip(self, body), level = "debug")]
    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%status, bytes = text.len(), "immich response");

        let decoded = if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&text)
        };

        let null = Value::Null;
        check_status(status, decoded.as_ref().unwrap_or(&null))?;
        decoded.map_err(|err| ApiError::remote(format!("invalid JSON from {path}: {err}")))
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let value = self.call(method, path, body).await?;
        serde_json::from_value(value)
            .map_err(|err| ApiError::remote(format!("unexpected response from {path}: {err}")))
    }

    pub async fn random_assets(&self, size: u32) -> Result<Vec<RandomAsset>> {
        let body = serde_json::json!({ "size": size });
        self.call_as(Method::POST, "/api/search/random", Some(&body))
            .await
    }

    pub async fn search_metadata(&self, query: &MetadataQuery) -> Result<AssetPage> {
        let body = serde_json::to_value(query)
            .map_err(|err| ApiError::remote(format!("failed to encode search query: {err}")))?;
        let response: MetadataResponse = self
            .call_as(Method::POST, "/api/search/metadata", Some(&body))
            .await?;
        Ok(response.assets)
    }

    pub async fn asset_info(&self, id: &str) -> Result<AssetInfo> {
        self.call_as(Method::GET, &format!("/api/assets/{id}"), None)
            .await
    }

    /// Fetches the original file bytes for `id`.
    pub async fn fetch_original(&self, id: &str) -> Result<Vec<u8>> {
        let path = format!("/api/assets/{id}/original");
        let response = self.http.get(self.url(&path)).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(status_error(status, &body));
        }
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

fn check_status(status: StatusCode, body: &Value) -> Result<()> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(status_error(status, body))
    }
}

fn status_error(status: StatusCode, body: &Value) -> ApiError {
    let message = format!("server returned {status}");
    let details = detail_map(body);
    if status == StatusCode::UNAUTHORIZED {
        ApiError::Auth { message, details }
    } else {
        ApiError::Remote { message, details }
    }
}
