//! AWS Signature Version 4 for object-storage GETs

use std::fmt;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::utils::{hmac_sha256, sha256_hex, to_hex};

/// Characters left as-is by SigV4 URI encoding; everything else is escaped.
pub(crate) const UNRESERVED: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Payload hash sent when the body is not hashed up front.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static access keys, optionally with a session token.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`, plus
    /// `AWS_SESSION_TOKEN` when set. `None` unless both keys are non-empty.
    pub fn from_env() -> Option<Self> {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|value| !value.is_empty());
        let credentials = Self::new(non_empty("AWS_ACCESS_KEY_ID")?, non_empty("AWS_SECRET_ACCESS_KEY")?);
        Some(match non_empty("AWS_SESSION_TOKEN") {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        })
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Signs requests for one region and service.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl Signer {
    pub fn new(credentials: AwsCredentials, region: impl Into<String>) -> Self {
        Self { credentials, region: region.into(), service: "s3".to_string() }
    }

    /// The headers to send with `method url`: `extra` plus `host`,
    /// `x-amz-content-sha256`, `x-amz-date`, the session token if any, and
    /// `authorization`. Names are lower-case.
    ///
    /// The path of `url` must already be URI-encoded.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, &str)],
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{}/{}/{}/aws4_request", now.format("%Y%m%d"), self.region, self.service);

        let mut headers: Vec<(String, String)> =
            extra.iter().map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string())).collect();
        headers.push(("host".to_string(), host_header(url)));
        headers.push(("x-amz-content-sha256".to_string(), payload_hash.to_string()));
        headers.push(("x-amz-date".to_string(), amz_date.clone()));
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort();

        let (canonical, signed_headers) = canonical_request(method, url, &headers, payload_hash);
        let string_to_sign = format!("{ALGORITHM}\n{amz_date}\n{scope}\n{}", sha256_hex(canonical.as_bytes()));
        let signature = to_hex(&hmac_sha256(&self.signing_key(now), string_to_sign.as_bytes()));

        headers.push((
            "authorization".to_string(),
            format!(
                "{ALGORITHM} Credential={}/{scope},SignedHeaders={signed_headers},Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        headers
    }

    fn signing_key(&self, now: DateTime<Utc>) -> [u8; 32] {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let date = hmac_sha256(secret.as_bytes(), now.format("%Y%m%d").to_string().as_bytes());
        let region = hmac_sha256(&date, self.region.as_bytes());
        let service = hmac_sha256(&region, self.service.as_bytes());
        hmac_sha256(&service, b"aws4_request")
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

/// `host[:port]`, with the port only when it is not the scheme default.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Canonical request text and the `;`-joined signed header names. `headers`
/// must be sorted by name.
fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    payload_hash: &str,
) -> (String, String) {
    let mut query: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (encode(&k), encode(&v))).collect();
    query.sort();
    let query = query.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");

    let canonical_headers: String = headers.iter().map(|(name, value)| format!("{name}:{value}\n")).collect();
    let signed_headers = headers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(";");

    let canonical =
        format!("{method}\n{}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}", url.path());
    (canonical, signed_headers)
}
