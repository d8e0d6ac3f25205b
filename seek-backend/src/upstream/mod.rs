//! Outbound REST plumbing for the services this backend fronts.
//!
//! Every call goes through the [`Upstream`] trait so controllers and the
//! reconciliation logic never touch reqwest directly. [`HttpUpstream`] is the
//! production implementation; tests swap in an in-memory fake.

mod http;
mod inventory;
mod user_service;

#[cfg(test)]
pub mod fake;

pub use http::HttpUpstream;
pub use inventory::InventoryClient;
pub use user_service::UserServiceClient;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::fmt;

/// A request against an upstream service, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Path (and optional query string) starting with '/'.
    pub path: String,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::GET, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::POST, path: path.into(), body: Some(body) }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::PUT, path: path.into(), body: Some(body) }
    }
}

/// Status and decoded body of an upstream reply.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
    /// Undecoded body text, kept for error echoes.
    pub text: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        let text = text.into();
        Self { status, body: decode_body(&text), text }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self { status, text: body.to_string(), body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parsed JSON if the body was JSON, `None` for the raw-text fallback.
    pub fn parsed(&self) -> Option<&Value> {
        match &self.body {
            Value::Object(map) if map.len() == 1 && map.contains_key("raw") => None,
            other => Some(other),
        }
    }
}

/// Decode an upstream text body: JSON when possible, `{}` when empty,
/// `{ "raw": text }` otherwise.
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
}

/// Failure to get any reply at all from an upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamError {
    /// Connection, DNS, TLS or timeout failure.
    Transport(String),
    /// The reply started but its body could not be read.
    Body(String),
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Transport(msg) => write!(f, "upstream request failed: {}", msg),
            UpstreamError::Body(msg) => write!(f, "failed to read upstream body: {}", msg),
        }
    }
}

impl std::error::Error for UpstreamError {}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;

    /// Base URL for log lines.
    fn describe(&self) -> String;
}

/// Percent-encode a single path segment.
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
