//! HTTP client for the DHIS2 Web API.
//!
//! All remote calls go through [`Dhis2Client`], which attaches credentials,
//! applies the request timeout and maps non-success statuses onto
//! [`ConfigError`] so callers never inspect raw HTTP responses.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{ConfigError, Result};

/// Credentials forwarded to the platform. Authorization itself is the platform's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    /// Personal access token (`Authorization: ApiToken <token>`)
    Token(String),
}

impl Auth {
    /// Pick credentials from the app config. A token wins over basic auth.
    pub fn from_config(config: &AppConfig) -> Self {
        if let Some(token) = config.api_token.as_ref().filter(|t| !t.is_empty()) {
            return Auth::Token(token.clone());
        }
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dhis2Client {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
}

impl Dhis2Client {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| ConfigError::Config(format!("Invalid base URL \"{base_url}\": {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Config(format!(
                "Scheme \"{}\" is not supported for the base URL",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ConfigError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            Auth::from_config(config),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `{base}/api/{path}`
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Token(token) => request.header("Authorization", format!("ApiToken {token}")),
        }
    }

    /// GET `path` with the given query parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "GET");
        let request = self.authorize(self.http.get(&url).query(query));
        let response = send(request).await?;
        Ok(response.json::<T>().await?)
    }

    /// GET `path` and hand back the raw JSON value (no shape assumptions).
    pub async fn get_value(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        self.get_json(path, query).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "PUT");
        send(self.authorize(self.http.put(&url).json(body))).await?;
        Ok(())
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "POST");
        send(self.authorize(self.http.post(&url).json(body))).await?;
        Ok(())
    }
}

/// Send a request and turn a non-success status into a typed error.
async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status.as_u16(), &body))
}

/// Map a failed response onto [`ConfigError`], preferring the API's own `message`.
pub(crate) fn error_for_status(status: u16, body: &str) -> ConfigError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });

    match status {
        401 | 403 => ConfigError::PermissionDenied { status, message },
        404 => ConfigError::NotFound(message),
        _ => ConfigError::Http {
            status: Some(status),
            message,
        },
    }
}

// ---------------------------------------------------------------------------
// Plugin URL validation
// ---------------------------------------------------------------------------

/// Validate a plugin launch URL entered by hand (local plugins).
/// Only http and https are accepted and a host is required.
pub fn validate_plugin_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| ConfigError::validation(format!("Invalid plugin URL \"{trimmed}\": {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ConfigError::validation(format!(
                "Scheme \"{scheme}\" is not allowed; use http or https"
            )))
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::validation(format!("Plugin URL \"{trimmed}\" has no host")));
    }
    Ok(())
}
