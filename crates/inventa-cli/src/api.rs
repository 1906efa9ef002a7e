//! # API Client
//!
//! Thin `reqwest` wrapper for the Inventa HTTP API. Adds the bearer token,
//! prefixes paths with `/v1`, and turns the API's error envelope into
//! readable `anyhow` errors.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

/// Request timeout for every API call.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a running Inventa API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `base_url`, authenticating with `token` when given.
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| anyhow!("token contains characters not allowed in a header"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `/v1/{path}` and decode the JSON body.
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(self.client.get(self.url(path)), "GET", path).await
    }

    /// POST `body` to `/v1/{path}` and decode the JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.post(self.url(path)).json(body), "POST", path)
            .await
    }

    async fn send(&self, request: RequestBuilder, method: &str, path: &str) -> Result<Value> {
        let resp = request
            .send()
            .await
            .with_context(|| format!("{method} {path}: request to {} failed", self.base_url))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("{method} {path}: {}", describe_failure(status, &text)));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).with_context(|| format!("{method} {path}: response is not JSON"))
    }
}

/// Render an API failure from its `{"error": {...}}` envelope, falling back
/// to the raw body.
fn describe_failure(status: StatusCode, body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return format!("HTTP {status}: {body}");
    };
    let error = &value["error"];
    let Some(message) = error["message"].as_str() else {
        return format!("HTTP {status}: {body}");
    };
    let mut out = format!("HTTP {status}: {message}");
    if let Some(details) = error["details"].as_object() {
        for (field, problem) in details {
            let problem = problem.as_str().map_or_else(|| problem.to_string(), str::to_string);
            out.push_str(&format!("\n  {field}: {problem}"));
        }
    }
    out
}
