//! Definition formatter: structured or source-text rendering

use std::fmt::Write;

use serde_json::Value;

use super::definition::{ExchangeDefinition, RecordedBody};

/// One rendered exchange, as handed to `play()` and the logging sink
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedExchange {
    /// Source-text call chain (text mode)
    Text(String),
    /// Structured definition (`output_objects`)
    Object(ExchangeDefinition),
}

impl RenderedExchange {
    /// Text content, if rendered as text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Object(_) => None,
        }
    }

    /// Structured definition, if rendered as an object
    #[must_use]
    pub fn as_object(&self) -> Option<&ExchangeDefinition> {
        match self {
            Self::Text(_) => None,
            Self::Object(def) => Some(def),
        }
    }
}

/// Render a definition as a copy-pasteable mock-construction call chain
///
/// The output reconstructs the [`mock`](crate::replay::mock) builder API:
/// JSON bodies embed as unstringified `json!` literals, binary bodies go
/// through the hex form.
pub(crate) fn render_definition(def: &ExchangeDefinition) -> String {
    let mut out = String::new();

    let _ = write!(out, "mock({})", quote(&def.scope));
    let _ = write!(
        out,
        "\n    .intercept({}, {})",
        quote(&def.method),
        quote(&def.path)
    );

    match &def.body {
        RecordedBody::Empty => {}
        RecordedBody::Text(text) => {
            let _ = write!(out, "\n    .body({})", quote(text));
        }
        RecordedBody::Json(value) => {
            let _ = write!(out, "\n    .body(json!({}))", compact(value));
        }
        RecordedBody::Binary(bytes) => {
            let _ = write!(out, "\n    .body_bytes({})", quote(&hex::encode(bytes)));
        }
    }

    if !def.query.is_empty() {
        let object: serde_json::Map<String, Value> = def
            .query
            .iter()
            .map(|(key, value)| (key.clone(), value.as_json()))
            .collect();
        let _ = write!(out, "\n    .query(json!({}))", compact(&Value::Object(object)));
    }

    if let Some(reqheaders) = &def.reqheaders {
        for (name, value) in reqheaders {
            let _ = write!(
                out,
                "\n    .match_header({}, {})",
                quote(name),
                quote(value)
            );
        }
    }

    match &def.response {
        RecordedBody::Empty => {
            let _ = write!(out, "\n    .reply({}, \"\")", def.status);
        }
        RecordedBody::Text(text) => {
            let _ = write!(out, "\n    .reply({}, {})", def.status, quote(text));
        }
        RecordedBody::Json(value) => {
            let _ = write!(out, "\n    .reply({}, json!({}))", def.status, compact(value));
        }
        RecordedBody::Binary(bytes) => {
            let _ = write!(
                out,
                "\n    .reply_bytes({}, {})",
                def.status,
                quote(&hex::encode(bytes))
            );
        }
    }

    if !def.raw_headers.is_empty() {
        let pairs: Vec<Value> = def
            .raw_headers
            .iter()
            .map(|(name, value)| {
                Value::Array(vec![
                    Value::String(name.clone()),
                    Value::String(value.clone()),
                ])
            })
            .collect();
        let _ = write!(
            out,
            "\n    .reply_headers(json!({}))",
            compact(&Value::Array(pairs))
        );
    }

    out.push(';');
    out
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_default()
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
