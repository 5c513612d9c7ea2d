//! Live mocks: builders, match state, and the serving set

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};

use crate::exchange::{ExchangeResponse, OutboundRequest};
use crate::recording::{
    normalize_scope, parse_query, scope_of, ExchangeDefinition, QueryValue, RecordedBody,
    DEFAULT_STATUS,
};
use crate::{ReelError, Result};

/// Body transform applied at match time: `(actual, recorded) -> compared`
pub type BodyFilter = Box<dyn Fn(&RecordedBody, &RecordedBody) -> RecordedBody + Send + Sync>;

/// Start building a mock registration for an origin
///
/// This is the call chain the recorder's text output reconstructs.
#[must_use]
pub fn mock(scope: impl Into<String>) -> MockBuilder {
    MockBuilder {
        def: ExchangeDefinition {
            scope: scope.into(),
            method: "GET".to_string(),
            path: "/".to_string(),
            query: BTreeMap::new(),
            body: RecordedBody::Empty,
            status: DEFAULT_STATUS,
            response: RecordedBody::Empty,
            reqheaders: None,
            raw_headers: Vec::new(),
        },
    }
}

/// Fluent constructor for an [`ExchangeDefinition`]
pub struct MockBuilder {
    def: ExchangeDefinition,
}

impl MockBuilder {
    /// Set the method and path to intercept
    #[must_use]
    pub fn intercept(mut self, method: &str, path: &str) -> Self {
        self.def.method = method.to_uppercase();
        self.def.path = path.to_string();
        self
    }

    /// Set the request body to match
    #[must_use]
    pub fn body(mut self, body: impl Into<RecordedBody>) -> Self {
        self.def.body = body.into();
        self
    }

    /// Set a binary request body from hex
    #[must_use]
    pub fn body_bytes(mut self, body_hex: &str) -> Self {
        self.def.body = hex::decode(body_hex).map(RecordedBody::Binary).unwrap_or(
            RecordedBody::Text(body_hex.to_string()),
        );
        self
    }

    /// Set the query parameters to match, as a JSON object
    #[must_use]
    pub fn query(mut self, query: Value) -> Self {
        if let Value::Object(object) = query {
            self.def.query = object
                .into_iter()
                .map(|(key, value)| (key, query_value(value)))
                .collect();
        }
        self
    }

    /// Require a request header to be present with this value
    #[must_use]
    pub fn match_header(mut self, name: &str, value: &str) -> Self {
        self.def
            .reqheaders
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Set the response status and body
    #[must_use]
    pub fn reply(mut self, status: u16, body: impl Into<RecordedBody>) -> Self {
        self.def.status = status;
        self.def.response = body.into();
        self
    }

    /// Set the response status with a binary body from hex
    #[must_use]
    pub fn reply_bytes(mut self, status: u16, body_hex: &str) -> Self {
        self.def.status = status;
        self.def.response = hex::decode(body_hex).map(RecordedBody::Binary).unwrap_or(
            RecordedBody::Text(body_hex.to_string()),
        );
        self
    }

    /// Set the response headers, as a JSON array of `[name, value]` pairs
    #[must_use]
    pub fn reply_headers(mut self, headers: Value) -> Self {
        if let Value::Array(pairs) = headers {
            self.def.raw_headers = pairs
                .into_iter()
                .filter_map(|pair| match pair {
                    Value::Array(pair) if pair.len() == 2 => Some((
                        json_string(&pair[0]),
                        json_string(&pair[1]),
                    )),
                    _ => None,
                })
                .collect();
        }
        self
    }

    /// Finish, producing the definition
    #[must_use]
    pub fn into_definition(self) -> ExchangeDefinition {
        self.def
    }
}

impl From<MockBuilder> for ExchangeDefinition {
    fn from(builder: MockBuilder) -> Self {
        builder.into_definition()
    }
}

fn query_value(value: Value) -> QueryValue {
    match value {
        Value::Array(values) => {
            QueryValue::Many(values.iter().map(json_string).collect())
        }
        other => QueryValue::Single(json_string(&other)),
    }
}

fn json_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Internal match state for one installed definition
pub(crate) struct MockState {
    definition: ExchangeDefinition,
    scope: String,
    matched: AtomicBool,
    filter: Mutex<Option<BodyFilter>>,
}

impl MockState {
    /// Validate a definition and prepare it for serving
    pub(crate) fn install(definition: ExchangeDefinition) -> Result<Arc<Self>> {
        let scope = normalize_scope(&definition.scope)?;

        Ok(Arc::new(Self {
            definition: ExchangeDefinition {
                method: definition.method.to_uppercase(),
                ..definition
            },
            scope,
            matched: AtomicBool::new(false),
            filter: Mutex::new(None),
        }))
    }

    pub(crate) fn is_matched(&self) -> bool {
        self.matched.load(Ordering::SeqCst)
    }

    pub(crate) fn set_filter(&self, filter: BodyFilter) {
        *self.filter.lock().expect("filter lock poisoned") = Some(filter);
    }

    pub(crate) fn description(&self) -> String {
        format!(
            "{} {}{}",
            self.definition.method, self.scope, self.definition.path
        )
    }

    fn matches(
        &self,
        scope: &str,
        request: &OutboundRequest,
        query: &BTreeMap<String, QueryValue>,
        body: &RecordedBody,
    ) -> bool {
        if self.scope != scope
            || self.definition.method != request.method()
            || self.definition.path != request.uri().path()
            || self.definition.query != *query
        {
            return false;
        }

        if let Some(reqheaders) = &self.definition.reqheaders {
            for (name, value) in reqheaders {
                if request.header_value(name) != Some(value.as_str()) {
                    return false;
                }
            }
        }

        let recorded = &self.definition.body;
        let compared = match &*self.filter.lock().expect("filter lock poisoned") {
            Some(filter) => filter(body, recorded),
            None => body.clone(),
        };

        compared == *recorded
    }

    /// Claim this mock for a single match
    fn try_claim(&self) -> bool {
        self.matched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// The recorded response, emitted as stored: no decompression, with the
    /// original content-encoding header re-advertised
    fn respond(&self) -> ExchangeResponse {
        ExchangeResponse {
            status: self.definition.status,
            headers: self.definition.raw_headers.clone(),
            body: self.definition.response.replay_bytes(),
        }
    }
}

/// The ordered set of mocks served while the context is in mock-serving mode
pub(crate) struct MockSet {
    mocks: Mutex<Vec<Arc<MockState>>>,
}

impl MockSet {
    pub(crate) fn new(mocks: Vec<Arc<MockState>>) -> Self {
        Self {
            mocks: Mutex::new(mocks),
        }
    }

    pub(crate) fn extend(&self, more: Vec<Arc<MockState>>) {
        self.mocks.lock().expect("mock lock poisoned").extend(more);
    }

    /// Answer a request from the first matching unconsumed mock
    pub(crate) fn serve(&self, request: &OutboundRequest) -> Result<ExchangeResponse> {
        let scope = scope_of(request.uri());
        let query = request
            .uri()
            .query()
            .map(parse_query)
            .unwrap_or_default();
        let body = RecordedBody::from_request(
            request.header_value("content-type"),
            &request.body_bytes(),
        );

        let mocks = self.mocks.lock().expect("mock lock poisoned").clone();
        for state in &mocks {
            if state.is_matched() {
                continue;
            }
            if state.matches(&scope, request, &query, &body) && state.try_claim() {
                debug!("mock matched: {}", state.description());
                return Ok(state.respond());
            }
        }

        warn!("unmatched request: {} {}", request.method(), request.uri());
        Err(ReelError::UnmatchedRequest {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
        })
    }
}

/// Handle to one installed mock
pub struct MockHandle {
    state: Arc<MockState>,
}

impl MockHandle {
    pub(crate) fn new(state: Arc<MockState>) -> Self {
        Self { state }
    }

    /// Whether this mock has been matched
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_matched()
    }

    /// Assert that this mock was matched
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::MockNotMatched`] if no request ever matched it
    pub fn done(&self) -> Result<()> {
        if self.state.is_matched() {
            Ok(())
        } else {
            Err(ReelError::MockNotMatched(self.state.description()))
        }
    }

    /// Install a body transform applied at match time
    ///
    /// The hook receives `(actual, recorded)` and returns the value compared
    /// against the recorded body, enabling fuzzy matching of recorded
    /// payloads. Applied at match time only; the stored definition is never
    /// mutated.
    pub fn filtering_request_body<F>(&self, filter: F) -> &Self
    where
        F: Fn(&RecordedBody, &RecordedBody) -> RecordedBody + Send + Sync + 'static,
    {
        self.state.set_filter(Box::new(filter));
        self
    }

    /// Human-readable `METHOD scope/path` label
    #[must_use]
    pub fn description(&self) -> String {
        self.state.description()
    }
}
