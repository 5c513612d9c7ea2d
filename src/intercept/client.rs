//! The injected outbound client that consults the interception context

use std::sync::Arc;

use tracing::debug;

use crate::exchange::{ExchangeResponse, OutboundRequest};
use crate::network::{HyperTransport, Transport};
use crate::Result;

use super::context::InterceptContext;
use super::Tap;

/// Outbound HTTP client with an interception tap
///
/// Calling code is configured with one of these at startup instead of a bare
/// transport; interception then stays transparent to it. While the context is
/// inactive, requests pass through untouched. In recording passthrough they
/// still reach the real destination and are observed; in mock serving they
/// are answered entirely from definitions.
pub struct InterceptedClient {
    ctx: Arc<InterceptContext>,
    transport: Arc<dyn Transport>,
}

impl InterceptedClient {
    /// Create a client over a custom transport
    #[must_use]
    pub fn new(ctx: Arc<InterceptContext>, transport: Arc<dyn Transport>) -> Self {
        Self { ctx, transport }
    }

    /// Create a client over the production [`HyperTransport`]
    #[must_use]
    pub fn with_default_transport(ctx: Arc<InterceptContext>) -> Self {
        Self::new(ctx, Arc::new(HyperTransport::new()))
    }

    /// The context this client consults
    #[must_use]
    pub fn context(&self) -> &Arc<InterceptContext> {
        &self.ctx
    }

    /// Issue a request through the tap
    ///
    /// In recording mode the definition is appended only after the response
    /// completes; a transport failure propagates unchanged and records
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns transport errors as-is, and
    /// [`ReelError::UnmatchedRequest`](crate::ReelError::UnmatchedRequest) in
    /// mock-serving mode when no definition matches.
    pub async fn send(&self, request: OutboundRequest) -> Result<ExchangeResponse> {
        match self.ctx.tap() {
            Tap::Passthrough => self.transport.send(&request).await,
            Tap::Record(recorder) => {
                let response = self.transport.send(&request).await?;
                recorder.record_exchange(&request, &response)?;
                Ok(response)
            }
            Tap::Serve(mocks) => {
                debug!("serving {} {} from mocks", request.method(), request.uri());
                mocks.serve(&request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordOptions;
    use crate::recording::Recorder;
    use crate::{ReelError, replay};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StaticTransport {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn send(&self, _request: &OutboundRequest) -> Result<ExchangeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReelError::Transport("connection refused".to_string()));
            }
            Ok(ExchangeResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: b"012345".to_vec(),
            })
        }
    }

    fn silent() -> RecordOptions {
        RecordOptions {
            dont_print: true,
            output_objects: true,
            ..RecordOptions::default()
        }
    }

    #[tokio::test]
    async fn test_passthrough_records_nothing() {
        let ctx = Arc::new(InterceptContext::new());
        let transport = Arc::new(StaticTransport::new());
        let client = InterceptedClient::new(Arc::clone(&ctx), Arc::clone(&transport) as Arc<dyn Transport>);

        let request = OutboundRequest::new("GET", "http://example.com/").unwrap();
        let response = client.send(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 1);
        assert!(Recorder::new(ctx).play().is_empty());
    }

    #[tokio::test]
    async fn test_recording_appends_one_definition() {
        let ctx = Arc::new(InterceptContext::new());
        let transport = Arc::new(StaticTransport::new());
        let client = InterceptedClient::new(Arc::clone(&ctx), Arc::clone(&transport) as Arc<dyn Transport>);
        let recorder = Recorder::new(Arc::clone(&ctx));

        recorder.rec(silent()).unwrap();
        let request = OutboundRequest::new("GET", "http://example.com/")
            .unwrap()
            .body("ABCDEF");
        client.send(request).await.unwrap();

        assert_eq!(transport.calls(), 1, "request still reaches the network");

        let played = recorder.play();
        assert_eq!(played.len(), 1);
        let def = played[0].as_object().unwrap();
        assert_eq!(def.method, "GET");
        assert_eq!(def.status, 200);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_unrecorded() {
        let ctx = Arc::new(InterceptContext::new());
        let client =
            InterceptedClient::new(Arc::clone(&ctx), Arc::new(StaticTransport::failing()));
        let recorder = Recorder::new(Arc::clone(&ctx));

        recorder.rec(silent()).unwrap();
        let request = OutboundRequest::new("GET", "http://example.com/").unwrap();

        assert!(matches!(
            client.send(request).await,
            Err(ReelError::Transport(_))
        ));
        assert!(recorder.play().is_empty(), "no partial definition");
    }

    #[tokio::test]
    async fn test_mock_serving_never_touches_transport() {
        let ctx = Arc::new(InterceptContext::new());
        let transport = Arc::new(StaticTransport::new());
        let client = InterceptedClient::new(Arc::clone(&ctx), Arc::clone(&transport) as Arc<dyn Transport>);

        let definition = replay::mock("http://example.com")
            .intercept("GET", "/")
            .reply(200, "012345")
            .into_definition();
        replay::define(&ctx, vec![definition]).unwrap();

        let request = OutboundRequest::new("GET", "http://example.com/").unwrap();
        let response = client.send(request).await.unwrap();

        assert_eq!(response.body, b"012345");
        assert_eq!(transport.calls(), 0);
    }
}
