use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};

use crate::chat::ChatConfig;
use crate::error::{Error, Result};
use crate::types::ChatRequest;

/// A streamed response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can open a streaming chat exchange.
///
/// [`ChatClient`] speaks HTTP; tests substitute canned byte streams.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request` and return the response body as it arrives.
    ///
    /// # Errors
    ///
    /// Returns a request error if the server cannot be reached or answers with a
    /// non-success status.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// Client for a workspace stream-chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    chat_url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client for the workspace named in `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key cannot be sent as a header, or an
    /// HTTP client error if the underlying client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let timeout = config.stream_timeout();
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            chat_url: config.chat_url(),
            headers: default_headers(&config.api_key)?,
            timeout,
        })
    }

    /// The URL every request is posted to.
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Classify a reqwest error raised while opening or reading the response.
    fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Convert a non-success response into an error carrying its status and body.
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("unexpected status");
        let body = response.text().await.unwrap_or_default();
        let body = body.trim();
        if body.is_empty() {
            Error::api(status.as_u16(), reason)
        } else {
            Error::api(status.as_u16(), format!("{reason}: {body}"))
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for ChatClient {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        let response = self
            .client
            .post(&self.chat_url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }
}

/// Build the fixed header set sent with every request.
fn default_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
        Error::config(
            "API key contains characters not allowed in a header",
            Some("api_key".to_string()),
        )
    })?;
    bearer.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, bearer);
    Ok(headers)
}
