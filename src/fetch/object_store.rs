//! Object storage downloads (`scheme://bucket/key`)

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use percent_encoding::utf8_percent_encode;
use url::Url;

use super::sigv4::{AwsCredentials, Signer, UNRESERVED, UNSIGNED_PAYLOAD};
use super::{HttpHandler, ProtocolHandler};
use crate::error::{Error, Result};

const DEFAULT_REGION: &str = "us-east-1";

/// Fetches whole objects by bucket and key.
pub trait ObjectStore: Send + Sync {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Split `scheme://bucket/key` once on `/` into bucket and key.
pub fn split_object_url<'a>(scheme: &str, source_url: &'a str) -> Result<(&'a str, &'a str)> {
    let invalid = |reason: &str| Error::InvalidDescriptor {
        url: source_url.to_string(),
        reason: reason.to_string(),
    };

    let rest = source_url.strip_prefix(scheme).ok_or_else(|| invalid("scheme mismatch"))?;
    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(invalid("bucket was empty"));
    }
    if key.is_empty() {
        return Err(invalid("key was empty"));
    }
    Ok((bucket, key))
}

/// Protocol handler for one object-storage scheme.
#[derive(Clone)]
pub struct ObjectStoreHandler {
    scheme: String,
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreHandler {
    pub fn new(scheme: impl Into<String>, store: impl ObjectStore + 'static) -> Self {
        Self { scheme: scheme.into(), store: Arc::new(store) }
    }
}

impl ProtocolHandler for ObjectStoreHandler {
    fn validate(&self, source_url: &str) -> Result<()> {
        split_object_url(&self.scheme, source_url).map(|_| ())
    }

    fn fetch(&self, source_url: &str, sink: &mut dyn Write) -> Result<()> {
        let (bucket, key) = split_object_url(&self.scheme, source_url)?;
        let body = self.store.get_object(bucket, key)?;
        sink.write_all(&body).map_err(|e| Error::fetch(source_url, e))?;
        tracing::debug!("Fetched {} bytes from bucket '{}' key '{}'", body.len(), bucket, key);
        Ok(())
    }
}

/// Path-style GETs against an S3-compatible endpoint.
///
/// Requests are signed with SigV4 when credentials are configured and sent
/// unsigned otherwise, which suits public objects and presigning gateways.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    endpoint: String,
    region: String,
    credentials: Option<AwsCredentials>,
    http: HttpHandler,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: DEFAULT_REGION.to_string(),
            credentials: None,
            http: HttpHandler::default(),
        }
    }

    /// Endpoint from `AWS_ENDPOINT_URL`, otherwise the regional AWS endpoint
    /// for `AWS_REGION` / `AWS_DEFAULT_REGION` (default `us-east-1`).
    /// Credentials come from [`AwsCredentials::from_env`].
    pub fn from_env() -> Self {
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| DEFAULT_REGION.to_string());
        let endpoint =
            std::env::var("AWS_ENDPOINT_URL").unwrap_or_else(|_| format!("https://s3.{region}.amazonaws.com"));
        let store = Self::new(endpoint).with_region(region);
        match AwsCredentials::from_env() {
            Some(credentials) => store.with_credentials(credentials),
            None => store,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_http(mut self, http: HttpHandler) -> Self {
        self.http = http;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Path-style object URL. Each `/`-separated part of the key is
    /// percent-encoded, so `?`, `#` and `%` stay part of the key.
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = key.split('/').map(|part| utf8_percent_encode(part, UNRESERVED).to_string()).collect::<Vec<_>>();
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            utf8_percent_encode(bucket, UNRESERVED),
            key.join("/")
        )
    }
}

impl ObjectStore for HttpObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, key);
        let headers = match &self.credentials {
            Some(credentials) => {
                let parsed = Url::parse(&url).map_err(|e| Error::fetch(&url, e))?;
                let signer = Signer::new(credentials.clone(), &self.region);
                signer.sign("GET", &parsed, &[], UNSIGNED_PAYLOAD, Utc::now())
            }
            None => Vec::new(),
        };
        let mut body = Vec::new();
        self.http.download_with_headers(&url, &headers, &mut body)?;
        Ok(body)
    }
}
