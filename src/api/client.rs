//! Blocking HTTP client for the table store API
//!
//! Endpoints used:
//!   GET  <base>/schema/{schema}/tables/{table}
//!   GET  <base>/schema/{schema}/tables/{table}/meta
//!   POST <base>/schema/{schema}/tables/{table}/rows/new   {"query": [...]}

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{ApiError, RowWriter, TableStore, WriteResponse, parse_table_info};
use crate::config::Settings;
use crate::models::{Row, TableRef, TableSchema};

/// Lower bound for write timeouts; batch inserts are slower than lookups
const MIN_WRITE_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest response body kept in error messages
const MAX_ERROR_BODY: usize = 500;

#[derive(Serialize)]
struct RowsBody<'a> {
    query: &'a [Row],
}

/// HTTP client for the table store
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    timeout: Duration,
    basic_auth: Option<(String, String)>,
}

impl ApiClient {
    /// Create a client for `base_url` (for example `https://host/api/v0`)
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| ApiError::Config(format!("Invalid API token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            http,
            timeout,
            basic_auth: None,
        })
    }

    /// Create a client from loaded settings
    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        let client = Self::new(
            &settings.api.base_url,
            settings.effective_token(),
            Duration::from_secs(settings.api.timeout_secs),
        )?;
        Ok(match (&settings.api.username, &settings.api.password) {
            (Some(user), Some(password)) => client.with_basic_auth(user, password),
            _ => client,
        })
    }

    /// Send HTTP basic auth with every request
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some((username.to_string(), password.to_string()));
        self
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join percent-encoded path segments onto the base URL.
    ///
    /// A trailing empty segment produces a trailing slash.
    pub fn url(&self, segments: &[&str]) -> String {
        let path: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s.trim_matches('/')).into_owned())
            .collect();
        format!("{}/{}", self.base_url, path.join("/"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.basic_auth {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    /// GET a JSON document; any non-2xx status is an error
    pub fn get_json(&self, segments: &[&str]) -> Result<Value, ApiError> {
        let url = self.url(segments);
        debug!("GET {}", url);

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let status = response.status();
        let body = response.text().map_err(|e| ApiError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// POST a JSON body once and return whatever the server answered
    pub fn post_json<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<WriteResponse, ApiError> {
        let url = self.url(segments);
        debug!("POST {}", url);

        let response = self
            .authorize(self.http.post(&url))
            .timeout(self.timeout.max(MIN_WRITE_TIMEOUT))
            .json(body)
            .send()
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|e| ApiError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let payload = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));
        Ok(WriteResponse::new(status, payload))
    }
}

impl TableStore for ApiClient {
    fn table_schema(&self, table: &TableRef) -> Result<TableSchema, ApiError> {
        let segments = ["schema", &table.schema, "tables", &table.name];
        let info = self.get_json(&segments)?;
        parse_table_info(table, &info).map_err(|message| ApiError::Decode {
            url: self.url(&segments),
            message,
        })
    }

    fn table_metadata(&self, table: &TableRef) -> Result<Value, ApiError> {
        self.get_json(&["schema", &table.schema, "tables", &table.name, "meta"])
    }
}

impl RowWriter for ApiClient {
    fn post_rows(&self, table: &TableRef, rows: &[Row]) -> Result<WriteResponse, ApiError> {
        self.post_json(
            &["schema", &table.schema, "tables", &table.name, "rows", "new"],
            &RowsBody { query: rows },
        )
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_and_encodes() {
        let client =
            ApiClient::new("http://localhost:8000/api/v0/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api/v0");
        assert_eq!(
            client.url(&["schema", "model_draft", "tables", "my table"]),
            "http://localhost:8000/api/v0/schema/model_draft/tables/my%20table"
        );
        assert_eq!(
            client.url(&["datasets", "example", ""]),
            "http://localhost:8000/api/v0/datasets/example/"
        );
    }

    #[test]
    fn test_rejects_invalid_token() {
        let err = ApiClient::new("http://localhost", Some("bad\ntoken"), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        let truncated = truncate(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
    }
}
