//! HTTP transport for catalog requests and downloads
//!
//! The store and the catalog client only talk to the network through the
//! [`Transport`] trait, so both can run against a scripted catalog in tests.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{CmpdError, Result};

/// An open response body
pub struct RemoteBody {
    /// Value of the content-length header, if the server sent one
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Read-only access to the catalog and its file hosts
pub trait Transport: Send + Sync {
    /// GET a URL and return the body as text
    fn get_text(&self, url: &str) -> Result<String>;

    /// GET a URL and return the body as a stream
    fn open(&self, url: &str) -> Result<RemoteBody>;
}

/// [`Transport`] backed by a blocking reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a client carrying the configured headers and timeout
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &api.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| CmpdError::Config(format!("bad header name {key:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CmpdError::Config(format!("bad value for header {key}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| CmpdError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| CmpdError::http(url, e))?;

        if !response.status().is_success() {
            return Err(CmpdError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String> {
        self.send(url)?.text().map_err(|e| CmpdError::http(url, e))
    }

    fn open(&self, url: &str) -> Result<RemoteBody> {
        let response = self.send(url)?;
        Ok(RemoteBody {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }
}
