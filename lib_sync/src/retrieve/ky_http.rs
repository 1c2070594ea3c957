//! # HTTP Retrieval Utilities
//!
//! This module provides an asynchronous API client wrapper around `reqwest`.
//! It includes optional middleware for exponential backoff retries and
//! standardized response handling that keeps three failure kinds apart:
//! the request never completed (transport), the server answered with a
//! non-2xx status (reported in `ApiResponse`), or the body did not decode.

use std::time::Duration;

use reqwest::{header::HeaderMap, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "support-sync/0.1";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("Failed to serialize request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode response body (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

/// Credentials attached to every request of a client.
#[derive(Debug, Clone, Default)]
pub enum ClientAuth {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: String,
    },
}

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with metadata about the
/// HTTP transaction, such as status codes and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs,
/// authentication and, when asked to, automatic retries of transient failures.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    auth: ClientAuth,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL. A base without a query string is
    ///   treated as a directory, so `https://host/api` and `https://host/api/`
    ///   both resolve `v1/items` to `https://host/api/v1/items`.
    /// * `auth` - Credentials sent with every request.
    /// * `max_retries` - Transient-failure retries with exponential backoff.
    ///   `0` installs no retry middleware at all.
    pub fn new(base_url: &str, auth: ClientAuth, max_retries: u32) -> Result<Self, HttpError> {
        let mut url = Url::parse(base_url)?;
        if url.query().is_none() && !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        let mut builder = ClientBuilder::new(http);
        if max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: builder.build(),
            base_url: url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs an HTTP request and decodes a 2xx body as JSON into `T`.
    ///
    /// Non-2xx answers are not errors: they come back with `success == false`
    /// and the raw body in `error_body`.
    ///
    /// # Errors
    /// `HttpError::Transport` when the request does not complete,
    /// `HttpError::Decode` when a 2xx body is not valid JSON for `T`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        headers: Option<HeaderMap>,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, HttpError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let raw = self.request_text(method, path, headers, body).await?;
        if !raw.success {
            return Ok(ApiResponse {
                data: None,
                error_body: raw.error_body,
                status: raw.status,
                success: false,
                headers: raw.headers,
            });
        }

        let text = raw.data.unwrap_or_default();
        let data = serde_json::from_str::<T>(&text).map_err(|source| HttpError::Decode {
            status: raw.status,
            source,
        })?;
        Ok(ApiResponse {
            data: Some(data),
            error_body: None,
            status: raw.status,
            success: true,
            headers: raw.headers,
        })
    }

    /// Performs an HTTP request and returns a 2xx body as text, undecoded.
    pub async fn request_text<B>(
        &self,
        method: Method,
        path: &str,
        headers: Option<HeaderMap>,
        body: Option<&B>,
    ) -> Result<ApiResponse<String>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        // 1. Construct the full absolute URL
        let full_url = if path.is_empty() {
            self.base_url.clone()
        } else {
            self.base_url.join(path)?
        };
        let mut req = self.inner.request(method, full_url);

        // 2. Add custom headers if provided
        if let Some(h) = headers {
            req = req.headers(h);
        }

        // 3. Inject authentication
        req = match &self.auth {
            ClientAuth::None => req,
            ClientAuth::Bearer(token) => req.bearer_auth(token),
            ClientAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
        };

        // 4. Serialize and attach the JSON body if present
        if let Some(b) = body {
            use reqwest::header::CONTENT_TYPE;
            let json_body = serde_json::to_string(b).map_err(HttpError::Encode)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        // 5. Execute the request and capture response metadata
        let response: reqwest::Response = req.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();
        let success = status.is_success();
        let text = response
            .text()
            .await
            .map_err(reqwest_middleware::Error::from)?;

        if success {
            Ok(ApiResponse {
                data: Some(text),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            Ok(ApiResponse {
                data: None,
                error_body: Some(text),
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_without_query_becomes_directory() {
        let client = ApiClient::new("https://support.example.com/portal", ClientAuth::None, 0).unwrap();
        assert_eq!(client.base_url().as_str(), "https://support.example.com/portal/");
        assert_eq!(
            client.base_url().join("openapi/v1/bi/maintenances").unwrap().as_str(),
            "https://support.example.com/portal/openapi/v1/bi/maintenances"
        );
    }

    #[test]
    fn test_base_with_query_is_left_alone() {
        let hook = "https://qyapi.example.com/cgi-bin/webhook/send?key=abc";
        let client = ApiClient::new(hook, ClientAuth::None, 0).unwrap();
        assert_eq!(client.base_url().as_str(), hook);
    }

    #[test]
    fn test_relative_base_is_rejected() {
        assert!(matches!(
            ApiClient::new("not a url", ClientAuth::None, 3),
            Err(HttpError::Url(_))
        ));
    }
}
