//! Shared request/response types for interception, recording, and replay

use bytes::Bytes;
use hyper::Uri;

use crate::{ReelError, Result};

/// An outbound HTTP request as seen by the interception seam
///
/// The URI must be absolute (scheme + authority); the recorder derives the
/// definition scope from it.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: String,
    uri: Uri,
    headers: Vec<(String, String)>,
    body_chunks: Vec<Bytes>,
}

impl OutboundRequest {
    /// Create a request for the given method and absolute URL
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be parsed or lacks scheme/host
    pub fn new(method: &str, url: &str) -> Result<Self> {
        let uri = url
            .parse::<Uri>()
            .map_err(|e| ReelError::InvalidUri(format!("{url}: {e}")))?;

        if uri.scheme_str().is_none() || uri.host().is_none() {
            return Err(ReelError::InvalidUri(format!(
                "{url}: outbound requests require an absolute URL"
            )));
        }

        Ok(Self {
            method: method.to_uppercase(),
            uri,
            headers: Vec::new(),
            body_chunks: Vec::new(),
        })
    }

    /// Append a request header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body with a single chunk
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body_chunks = vec![body.into()];
        self
    }

    /// Write one body chunk, streaming style
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::MissingBodyData`] if the chunk is `None`; writing
    /// nothing is a contract violation, not an empty write.
    pub fn write(&mut self, chunk: Option<&[u8]>) -> Result<()> {
        let chunk = chunk.ok_or(ReelError::MissingBodyData)?;
        self.body_chunks.push(Bytes::copy_from_slice(chunk));
        Ok(())
    }

    /// HTTP method, uppercase
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Absolute request URI
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers in insertion order
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value for `name`, case-insensitive
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated body bytes
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for chunk in &self.body_chunks {
            data.extend_from_slice(chunk);
        }
        data
    }
}

/// Response delivered back through the interception seam
#[derive(Debug, Clone)]
pub struct ExchangeResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in wire order
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl ExchangeResponse {
    /// First header value for `name`, case-insensitive
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as lossy UTF-8 text
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
