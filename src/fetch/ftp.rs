//! FTP downloads

use std::io::Write;

use suppaftp::types::FileType;
use suppaftp::FtpStream;
use url::Url;

use super::ProtocolHandler;
use crate::error::{Error, Result};

const DEFAULT_PORT: u16 = 21;
const ANONYMOUS: &str = "anonymous";

/// Retrieves `ftp://[user[:password]@]host[:port]/path` in binary mode.
///
/// Credentials default to anonymous login. No retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpHandler;

/// Connection parameters extracted from an FTP URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub path: String,
}

impl FtpTarget {
    pub fn parse(source_url: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidDescriptor {
            url: source_url.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(source_url).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "ftp" {
            return Err(invalid("not an ftp:// URL"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?.to_string();
        let path = url.path().to_string();
        if path.is_empty() || path == "/" {
            return Err(invalid("missing file path"));
        }

        let user = if url.username().is_empty() { ANONYMOUS } else { url.username() };
        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            user: user.to_string(),
            password: url.password().unwrap_or(ANONYMOUS).to_string(),
            path,
        })
    }
}

impl ProtocolHandler for FtpHandler {
    fn validate(&self, source_url: &str) -> Result<()> {
        FtpTarget::parse(source_url).map(|_| ())
    }

    fn fetch(&self, source_url: &str, sink: &mut dyn Write) -> Result<()> {
        let target = FtpTarget::parse(source_url)?;
        let failed = |e: suppaftp::FtpError| Error::fetch(source_url, e);

        let mut ftp = FtpStream::connect((target.host.as_str(), target.port)).map_err(failed)?;
        ftp.login(target.user.as_str(), target.password.as_str()).map_err(failed)?;
        ftp.transfer_type(FileType::Binary).map_err(failed)?;
        let mut body = ftp.retr_as_buffer(target.path.as_str()).map_err(failed)?;

        let written = std::io::copy(&mut body, sink).map_err(|e| Error::fetch(source_url, e))?;
        if let Err(e) = ftp.quit() {
            tracing::debug!("FTP QUIT for {} failed: {}", source_url, e);
        }
        tracing::debug!("Retrieved {} bytes from {}", written, source_url);
        Ok(())
    }
}
