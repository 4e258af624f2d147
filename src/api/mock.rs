//! Scripted mock transport
//!
//! Replies are queued per route (`METHOD url`). A route pops its queue until
//! one reply is left; the last reply then repeats, which keeps polling
//! scripts short. Every call is recorded for assertions.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::transport::{HttpResponse, Method, Transport, TransportError};

/// A scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this response
    Response(HttpResponse),
    /// Fail with a connection error
    ConnectionError(String),
}

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Vec<u8>>,
    /// Uploaded file, for `upload` calls
    pub upload_path: Option<PathBuf>,
}

/// In-process transport for tests
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn route_key(method: Method, url: &str) -> String {
    format!("{} {}", method.as_str(), url)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a route
    pub fn push(&self, method: Method, url: &str, reply: MockReply) {
        self.routes
            .lock()
            .unwrap()
            .entry(route_key(method, url))
            .or_default()
            .push_back(reply);
    }

    /// Queue a response with the given status and body
    pub fn push_response(&self, method: Method, url: &str, status: u16, body: &str) {
        self.push(
            method,
            url,
            MockReply::Response(HttpResponse::new(status, body.as_bytes().to_vec())),
        );
    }

    /// Queue a 200 JSON response
    pub fn push_json(&self, method: Method, url: &str, body: &serde_json::Value) {
        self.push_response(method, url, 200, &body.to_string());
    }

    /// Queue a connection failure
    pub fn push_connection_error(&self, method: Method, url: &str, message: &str) {
        self.push(method, url, MockReply::ConnectionError(message.to_string()));
    }

    /// All recorded calls, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls made to a route
    pub fn call_count(&self, method: Method, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    fn record(&self, request: RecordedRequest) {
        self.requests.lock().unwrap().push(request);
    }

    fn next_reply(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&route_key(method, url));
        let reply = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::ConnectionError(message)) => Err(TransportError::Connection(message)),
            None => Err(TransportError::Connection(format!(
                "no mock reply for {}",
                route_key(method, url)
            ))),
        }
    }
}

impl Transport for MockTransport {
    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, TransportError> {
        self.record(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.map(|b| b.to_vec()),
            upload_path: None,
        });
        self.next_reply(method, url)
    }

    fn upload(&self, url: &str, path: &Path) -> Result<HttpResponse, TransportError> {
        let bytes = fs::read(path)?;
        self.record(RecordedRequest {
            method: Method::Put,
            url: url.to_string(),
            body: Some(bytes),
            upload_path: Some(path.to_path_buf()),
        });
        self.next_reply(Method::Put, url)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<HttpResponse, TransportError> {
        self.record(RecordedRequest {
            method: Method::Get,
            url: url.to_string(),
            body: None,
            upload_path: None,
        });
        let response = self.next_reply(Method::Get, url)?;
        if response.is_success() {
            fs::write(dest, &response.body)?;
        }
        Ok(response)
    }
}
