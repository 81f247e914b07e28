//! Wire envelope exchanged over the bus.
//!
//! An [`Envelope`] carries an opaque payload plus a header map. The pub/sub
//! backends have no notion of message headers, so the headers travel inside
//! the serialized body and carry the propagated causal context (W3C
//! `traceparent`, `tracestate`, `baggage`).
//!
//! Header keys follow MIME header semantics: lookups are case-insensitive and
//! keys are stored in canonical form (`Traceparent`), which keeps the JSON
//! encoding identical to what HTTP-header based producers emit.

use std::collections::BTreeMap;

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::Context;
use serde::{Deserialize, Serialize};

/// Raw multi-valued header map, as it appears on the wire.
pub type HeaderMap = BTreeMap<String, Vec<String>>;

/// Case-insensitive, multi-valued header map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<HeaderMap>", into = "HeaderMap")]
pub struct Headers(HeaderMap);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&canonical_key(key))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0
            .get(&canonical_key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace every value of `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(canonical_key(key), vec![value.into()]);
    }

    /// Append `value` to the values of `key`.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .entry(canonical_key(key))
            .or_default()
            .push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(&canonical_key(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl From<Option<HeaderMap>> for Headers {
    fn from(map: Option<HeaderMap>) -> Self {
        map.map(Headers::from).unwrap_or_default()
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        let mut headers = Headers::new();
        for (key, values) in map {
            headers
                .0
                .entry(canonical_key(&key))
                .or_default()
                .extend(values);
        }
        headers
    }
}

impl From<Headers> for HeaderMap {
    fn from(headers: Headers) -> Self {
        headers.0
    }
}

impl Injector for Headers {
    fn set(&mut self, key: &str, value: String) {
        Headers::set(self, key, value);
    }
}

impl Extractor for Headers {
    fn get(&self, key: &str) -> Option<&str> {
        Headers::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Canonical MIME form of a header key: `x-request-id` -> `X-Request-Id`.
///
/// Keys containing bytes that are not valid in a header token are returned
/// unchanged.
pub fn canonical_key(key: &str) -> String {
    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut upper = true;
    key.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// The unit published on the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque application body.
    #[serde(rename = "Body", default)]
    pub payload: String,
    /// Carrier for propagated causal context. Never absent, possibly empty.
    #[serde(rename = "Header", default)]
    pub headers: Headers,
}

impl Envelope {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Write the causal context of `cx` into the headers.
    pub fn inject(&mut self, propagator: &dyn TextMapPropagator, cx: &Context) {
        propagator.inject_context(cx, &mut self.headers);
    }

    /// Derive a context from `base` carrying the causal link stored in the
    /// headers. Returns `base` unchanged when no link is present.
    pub fn extract(&self, propagator: &dyn TextMapPropagator, base: &Context) -> Context {
        propagator.extract_with_context(base, &self.headers)
    }
}
