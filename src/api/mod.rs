//! Device-farm intermediary API client
//!
//! Routes (all keyed by app slug, build slug, and API token):
//! - `POST /assets/{app}/{build}/{token}`: pre-signed upload URLs
//! - `POST /{app}/{build}/{token}`: start the test matrix
//! - `GET /{app}/{build}/{token}`: current step list
//! - `GET /assets/{app}/{build}/{token}`: result file download URLs

pub mod mock;
pub mod model;
pub mod transport;

pub use mock::{MockReply, MockTransport, RecordedRequest};
pub use model::{ListStepsResponse, Step, TestMatrix, UploadUrls};
pub use transport::{HttpConfig, HttpResponse, HttpTransport, Method, Transport, TransportError};

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::{Config, Secret};

/// API errors. Messages never include request URLs, which carry the token.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("failed to {operation}: status {status}, body: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to {operation}: invalid response ({source}), body: {body}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Client for one app/build pair
pub struct ApiClient<T: Transport> {
    transport: T,
    base_url: String,
    app_slug: String,
    build_slug: String,
    token: Secret,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(
        transport: T,
        base_url: impl Into<String>,
        app_slug: impl Into<String>,
        build_slug: impl Into<String>,
        token: Secret,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            app_slug: app_slug.into(),
            build_slug: build_slug.into(),
            token,
        }
    }

    /// Client for the configured app and build
    pub fn from_config(transport: T, config: &Config) -> Self {
        Self::new(
            transport,
            config.api_base_url.clone(),
            config.app_slug.clone(),
            config.build_slug.clone(),
            config.api_token.clone(),
        )
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// URL of the test run resource
    pub fn run_url(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.app_slug,
            self.build_slug,
            self.token.expose()
        )
    }

    /// URL of the assets resource
    pub fn assets_url(&self) -> String {
        format!(
            "{}/assets/{}/{}/{}",
            self.base_url,
            self.app_slug,
            self.build_slug,
            self.token.expose()
        )
    }

    /// Request pre-signed upload URLs for the test bundle
    pub fn request_upload_urls(&self) -> Result<UploadUrls, ApiError> {
        const OP: &str = "request upload URLs";
        let response = self.send(OP, Method::Post, &self.assets_url(), None)?;
        decode(OP, &response)
    }

    /// Start the test matrix
    pub fn start_test(&self, matrix: &TestMatrix) -> Result<(), ApiError> {
        let body = serde_json::to_vec(matrix)?;
        debug!(bytes = body.len(), "Submitting test matrix");
        self.send("start test", Method::Post, &self.run_url(), Some(&body))?;
        Ok(())
    }

    /// Fetch the current step list.
    ///
    /// A transport error or non-success status is retried once, immediately.
    /// A second failure is returned.
    pub fn fetch_steps(&self) -> Result<ListStepsResponse, ApiError> {
        const OP: &str = "get test status";
        let url = self.run_url();

        let response = match self.transport.request(Method::Get, &url, None) {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = response.status, "Test status request failed, retrying");
                self.send(OP, Method::Get, &url, None)?
            }
            Err(error) => {
                warn!(%error, "Test status request failed, retrying");
                self.send(OP, Method::Get, &url, None)?
            }
        };

        decode(OP, &response)
    }

    /// Fetch result file names and their download URLs
    pub fn fetch_asset_urls(&self) -> Result<BTreeMap<String, String>, ApiError> {
        const OP: &str = "get test assets";
        let response = self.send(OP, Method::Get, &self.assets_url(), None)?;
        decode(OP, &response)
    }

    fn send(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, ApiError> {
        let response = self
            .transport
            .request(method, url, body)
            .map_err(|source| ApiError::Transport { operation, source })?;

        if !response.is_success() {
            return Err(ApiError::Status {
                operation,
                status: response.status,
                body: response.body_text(),
            });
        }

        Ok(response)
    }
}

fn decode<D: DeserializeOwned>(operation: &'static str, response: &HttpResponse) -> Result<D, ApiError> {
    serde_json::from_slice(&response.body).map_err(|source| ApiError::Decode {
        operation,
        source,
        body: response.body_text(),
    })
}
