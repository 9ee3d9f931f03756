//! HTTP(S) downloads

use std::io::Write;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::blocking::Client;

use super::ProtocolHandler;
use crate::error::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streaming GET; the response body is copied chunk by chunk into the sink.
///
/// A non-success status is a [`Error::FetchFailed`]. The underlying client is
/// built on first use and shared by clones of the handler.
#[derive(Debug, Clone)]
pub struct HttpHandler {
    timeout: Duration,
    use_proxy: bool,
    client: Arc<OnceLock<Client>>,
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, use_proxy: true, client: Arc::default() }
    }
}

impl HttpHandler {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = Arc::default();
        self
    }

    /// Ignore `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub fn no_proxy(mut self) -> Self {
        self.use_proxy = false;
        self.client = Arc::default();
        self
    }

    pub(crate) fn client(&self, url: &str) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let mut builder = Client::builder().timeout(self.timeout);
        if !self.use_proxy {
            builder = builder.no_proxy();
        }
        let built = builder.build().map_err(|e| Error::fetch(url, e))?;
        Ok(self.client.get_or_init(|| built))
    }

    /// GET `url` and copy the body into `sink`, returning the byte count.
    pub(crate) fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.download_with_headers(url, &[], sink)
    }

    /// Like [`HttpHandler::download`], sending `headers` with the request.
    pub(crate) fn download_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
        sink: &mut dyn Write,
    ) -> Result<u64> {
        let mut request = self.client(url)?.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let mut response = request.send().map_err(|e| Error::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("HTTP {status}")));
        }

        std::io::copy(&mut response, sink).map_err(|e| Error::fetch(url, e))
    }
}

impl ProtocolHandler for HttpHandler {
    fn fetch(&self, source_url: &str, sink: &mut dyn Write) -> Result<()> {
        let written = self.download(source_url, sink)?;
        tracing::debug!("Downloaded {} bytes from {}", written, source_url);
        Ok(())
    }
}
