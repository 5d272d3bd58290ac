//! HTTP client for the chat backend.
//!
//! [`ChatBackend`] is the seam the controller talks through; [`ChatClient`]
//! implements it over `reqwest` against the five backend endpoints.

use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde_json::Value;
use url::Url;

use crate::auth::{AuthKind, Credentials};
use crate::error::{Error, Result};
use crate::history::HistoryMessage;
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS};
use crate::upload::UploadFile;

/// Default backend address, matching the development server.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/";

/// A chat response body, as a stream of raw byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// How the bytes of a chat response are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    /// Decide from the response `Content-Type`.
    Auto,
    /// Every decoded byte is display text.
    #[default]
    Raw,
    /// `text/event-stream` frames carrying `chunk` fields.
    EventStream,
}

impl StreamFormat {
    /// Resolves `Auto` against the response content type.
    pub fn resolve(self, content_type: Option<&str>) -> Self {
        match self {
            StreamFormat::Auto => {
                let is_sse = content_type
                    .map(|ct| ct.trim_start().starts_with("text/event-stream"))
                    .unwrap_or(false);
                if is_sse {
                    StreamFormat::EventStream
                } else {
                    StreamFormat::Raw
                }
            }
            other => other,
        }
    }
}

impl std::str::FromStr for StreamFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(StreamFormat::Auto),
            "raw" | "text" => Ok(StreamFormat::Raw),
            "sse" | "event-stream" => Ok(StreamFormat::EventStream),
            _ => Err(format!(
                "Invalid stream format: {s}. Valid options: auto, raw, sse"
            )),
        }
    }
}

/// The raw answer of `/login` or `/register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, uninterpreted.
    pub body: String,
}

impl AuthResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A streaming chat reply.
pub struct ChatResponse {
    /// Body interpretation; never `Auto` when produced by [`ChatClient`].
    pub format: StreamFormat,
    /// The body, chunk by chunk, in arrival order.
    pub body: ByteStream,
}

/// Operations the front end needs from the backend.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// POSTs credentials to `/login` or `/register`.
    ///
    /// Any status is returned as a response; only transport failures are errors.
    async fn authenticate(&self, kind: AuthKind, credentials: &Credentials)
    -> Result<AuthResponse>;

    /// POSTs a query to `/chat` and returns the streaming body.
    async fn chat(&self, token: &str, query: &str) -> Result<ChatResponse>;

    /// POSTs a file to `/upload` as multipart form data.
    async fn upload(&self, token: &str, file: &UploadFile) -> Result<Value>;

    /// GETs the ordered message history.
    async fn history(&self, token: &str) -> Result<Vec<HistoryMessage>>;
}

/// Client for the chat backend.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Option<Duration>,
    stream_format: StreamFormat,
}

impl ChatClient {
    /// Creates a client for `base_url` with no request timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, None, StreamFormat::Raw)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds each whole request including the streamed body;
    /// `None` waits indefinitely.
    pub fn with_options(
        base_url: &str,
        timeout: Option<Duration>,
        stream_format: StreamFormat,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout).connect_timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            stream_format,
        })
    }

    /// The base every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configured chat body format.
    pub fn stream_format(&self) -> StreamFormat {
        self.stream_format
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                self.timeout.map(|t| t.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    async fn send(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(endpoint, "sending request");
        let response = request.send().await.map_err(|e| {
            tracing::warn!(endpoint, error = %e, "request failed");
            self.request_error(e)
        })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        tracing::debug!(endpoint, status = response.status().as_u16(), "response headers");
        Ok(response)
    }

    /// Turns a non-success response into an error carrying its raw body.
    async fn process_error_response(&self, response: Response) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => Error::from_status(status, body),
            Err(e) => Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }

    async fn read_json(&self, response: Response) -> Result<Value> {
        if !response.status().is_success() {
            return Err(self.process_error_response(response).await);
        }
        response.json::<Value>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn authenticate(
        &self,
        kind: AuthKind,
        credentials: &Credentials,
    ) -> Result<AuthResponse> {
        let url = self.endpoint(kind.endpoint())?;
        let request = self.client.post(url).json(credentials);
        let response = self.send(kind.endpoint(), request).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        Ok(AuthResponse { status, body })
    }

    async fn chat(&self, token: &str, query: &str) -> Result<ChatResponse> {
        let url = self.endpoint("chat")?;
        let request = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "query": query }));
        let response = self.send("chat", request).await?;
        if !response.status().is_success() {
            return Err(self.process_error_response(response).await);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value: &HeaderValue| value.to_str().ok());
        let format = self.stream_format.resolve(content_type);
        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(ChatResponse {
            format,
            body: Box::pin(body),
        })
    }

    async fn upload(&self, token: &str, file: &UploadFile) -> Result<Value> {
        let url = self.endpoint("upload")?;
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| {
                Error::validation(
                    format!("Invalid media type {}: {e}", file.media_type),
                    Some("media_type".to_string()),
                )
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self.client.post(url).bearer_auth(token).multipart(form);
        let response = self.send("upload", request).await?;
        self.read_json(response).await
    }

    async fn history(&self, token: &str) -> Result<Vec<HistoryMessage>> {
        let url = self.endpoint("history")?;
        let request = self.client.get(url).bearer_auth(token);
        let response = self.send("history", request).await?;
        let value = self.read_json(response).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = ChatClient::new(DEFAULT_API_BASE).unwrap();
        assert_eq!(client.base_url().as_str(), DEFAULT_API_BASE);
        assert_eq!(client.timeout, None);
        assert_eq!(client.stream_format(), StreamFormat::Raw);
        assert_eq!(StreamFormat::default(), StreamFormat::Raw);

        let client = ChatClient::with_options(
            "https://chat.example.com/api",
            Some(Duration::from_secs(30)),
            StreamFormat::Raw,
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "https://chat.example.com/api/");
        assert_eq!(client.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn endpoints_resolve_under_base() {
        let client = ChatClient::new("https://chat.example.com/api/").unwrap();
        assert_eq!(
            client.endpoint("login").unwrap().as_str(),
            "https://chat.example.com/api/login"
        );
        assert_eq!(
            client.endpoint("history").unwrap().as_str(),
            "https://chat.example.com/api/history"
        );
    }

    #[test]
    fn invalid_base_url() {
        assert!(matches!(
            ChatClient::new("not a url"),
            Err(Error::Url { .. })
        ));
    }

    #[test]
    fn stream_format_resolution() {
        assert_eq!(
            StreamFormat::Auto.resolve(Some("text/event-stream; charset=utf-8")),
            StreamFormat::EventStream
        );
        assert_eq!(
            StreamFormat::Auto.resolve(Some("text/plain")),
            StreamFormat::Raw
        );
        assert_eq!(StreamFormat::Auto.resolve(None), StreamFormat::Raw);
        assert_eq!(
            StreamFormat::Raw.resolve(Some("text/event-stream")),
            StreamFormat::Raw
        );
        assert_eq!("sse".parse::<StreamFormat>(), Ok(StreamFormat::EventStream));
        assert!("bogus".parse::<StreamFormat>().is_err());
    }

    #[test]
    fn auth_response_success() {
        let ok = AuthResponse {
            status: 200,
            body: String::new(),
        };
        let denied = AuthResponse {
            status: 401,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!denied.is_success());
    }

    #[tokio::test]
    #[ignore] // Requires a running backend at PARLEY_API_BASE.
    async fn login_against_live_backend() {
        let Ok(base) = std::env::var("PARLEY_API_BASE") else {
            println!("Skipping login_against_live_backend: PARLEY_API_BASE not set");
            return;
        };
        let client = ChatClient::new(&base).unwrap();
        let credentials = Credentials::new("parley-test", "parley-test");
        let response = client
            .authenticate(AuthKind::Login, &credentials)
            .await
            .unwrap();
        assert!(!response.body.is_empty());
    }
}
