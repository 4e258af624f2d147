//! HTTP transport
//!
//! Abstracts the HTTP layer for testability. Provides:
//! - Transport trait: blocking request, upload, and download
//! - HttpTransport: `ureq` implementation for production
//! - MockTransport (see `mock`): scripted in-process transport for tests
//!
//! Non-success HTTP statuses are returned as responses, never as errors.
//! Only connection and I/O failures are `TransportError`s.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossy
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Transport trait for HTTP communication
pub trait Transport {
    /// Send a request with an optional JSON body
    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, TransportError>;

    /// Stream a file to a pre-signed URL with `PUT`, setting `Content-Length`
    fn upload(&self, url: &str, path: &Path) -> Result<HttpResponse, TransportError>;

    /// Stream a URL into `dest` with `GET`; `dest` is only written on success
    fn download(&self, url: &str, dest: &Path) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, TransportError> {
        (**self).request(method, url, body)
    }

    fn upload(&self, url: &str, path: &Path) -> Result<HttpResponse, TransportError> {
        (**self).upload(url, path)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<HttpResponse, TransportError> {
        (**self).download(url, dest)
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout
    pub connect_timeout: Duration,

    /// Read timeout for API calls and transfers
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(300),
        }
    }
}

/// Blocking HTTP transport backed by `ureq`
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

impl Transport for HttpTransport {
    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, TransportError> {
        let request = self.agent.request(method.as_str(), url);
        let result = match body {
            Some(bytes) => request
                .set("Content-Type", "application/json")
                .send_bytes(bytes),
            None => request.call(),
        };
        read_response(result)
    }

    fn upload(&self, url: &str, path: &Path) -> Result<HttpResponse, TransportError> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        let result = self
            .agent
            .put(url)
            .set("Content-Length", &size.to_string())
            .send(file);
        read_response(result)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<HttpResponse, TransportError> {
        match self.agent.get(url).call() {
            Ok(response) => {
                let status = response.status();
                let mut out = File::create(dest)?;
                io::copy(&mut response.into_reader(), &mut out)?;
                Ok(HttpResponse::new(status, Vec::new()))
            }
            other => read_response(other),
        }
    }
}

fn read_response(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<HttpResponse, TransportError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(error) => return Err(TransportError::Connection(error.to_string())),
    };

    let status = response.status();
    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body)?;
    Ok(HttpResponse { status, body })
}
