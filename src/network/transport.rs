//! Outbound transport: the swappable seam interception is injected through

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::exchange::{ExchangeResponse, OutboundRequest};
use crate::{ReelError, Result};

/// Outbound connection seam
///
/// Production code uses [`HyperTransport`]; tests can substitute their own
/// implementation without touching the interception layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a request to the real network and collect the full response
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the response body
    /// cannot be read
    async fn send(&self, request: &OutboundRequest) -> Result<ExchangeResponse>;
}

/// Plaintext HTTP transport over hyper's pooled client
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    /// Create a new transport
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<ExchangeResponse> {
        let method = request.method().parse::<Method>().map_err(|e| {
            ReelError::Transport(format!("invalid HTTP method '{}': {e}", request.method()))
        })?;

        debug!("forwarding {} {}", request.method(), request.uri());

        let mut builder = Request::builder().method(method).uri(request.uri().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        let http_request = builder
            .body(Full::new(Bytes::from(request.body_bytes())))
            .map_err(|e| ReelError::Transport(format!("failed to build request: {e}")))?;

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("request failed: {e}");
            ReelError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid>").to_string(),
                )
            })
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ReelError::Transport(format!("failed to read response body: {e}")))?
            .to_bytes();

        Ok(ExchangeResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = HyperTransport::new();
        assert!(std::mem::size_of_val(&transport) > 0);
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let transport = HyperTransport::new();
        let request = OutboundRequest::new("SP ACE", "http://127.0.0.1:1/").unwrap();

        assert!(matches!(
            transport.send(&request).await,
            Err(ReelError::Transport(_))
        ));
    }
}
