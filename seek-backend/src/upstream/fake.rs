//! In-memory [`Upstream`] for tests: canned replies per route, call log,
//! and optional simulation of link writes.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Value};

use super::{Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};

enum Reply {
    Respond(UpstreamResponse),
    Fail(String),
}

#[derive(Default)]
pub struct FakeUpstream {
    routes: Mutex<HashMap<(Method, String), Reply>>,
    calls: Mutex<Vec<UpstreamRequest>>,
    simulate_links: bool,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful link PUTs make the matching reverse lookup resolve to the
    /// written address, like the real service.
    pub fn simulating_links() -> Self {
        Self { simulate_links: true, ..Self::default() }
    }

    pub fn with(self, method: Method, path: &str, status: u16, body: Value) -> Self {
        self.set(method, path, status, body);
        self
    }

    pub fn with_text(self, method: Method, path: &str, status: u16, text: &str) -> Self {
        self.routes
            .lock()
            .insert((method, path.to_string()), Reply::Respond(UpstreamResponse::new(status, text)));
        self
    }

    pub fn failing(self, method: Method, path: &str, message: &str) -> Self {
        self.routes
            .lock()
            .insert((method, path.to_string()), Reply::Fail(message.to_string()));
        self
    }

    pub fn set(&self, method: Method, path: &str, status: u16, body: Value) {
        self.routes.lock().insert(
            (method, path.to_string()),
            Reply::Respond(UpstreamResponse::json(status, body)),
        );
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    fn record_link(&self, request: &UpstreamRequest) {
        let parts: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        let ["users", address, kind] = parts.as_slice() else {
            return;
        };
        let (lookup, field) = match *kind {
            "email" => ("by-email", "email"),
            "x-handle" => ("by-x", "xHandle"),
            "discord-handle" => ("by-discord", "discordHandle"),
            _ => return,
        };
        let Some(value) = request.body.as_ref().and_then(|b| b[field].as_str()) else {
            return;
        };
        let encoded = if lookup == "by-email" {
            value.to_string()
        } else {
            urlencoding::encode(value).into_owned()
        };
        let mut record = serde_json::Map::new();
        record.insert("address".to_string(), json!(address));
        record.insert(field.to_string(), json!(value));
        self.set(
            Method::GET,
            &format!("/users/{}/{}", lookup, encoded),
            200,
            Value::Object(record),
        );
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.lock().push(request.clone());

        let key = (request.method.clone(), request.path.clone());
        let reply = match self.routes.lock().get(&key) {
            Some(Reply::Respond(resp)) => Ok(resp.clone()),
            Some(Reply::Fail(msg)) => Err(UpstreamError::Transport(msg.clone())),
            None if self.simulate_links && request.method == Method::PUT => {
                Ok(UpstreamResponse::json(200, json!({ "ok": true })))
            }
            None => Ok(UpstreamResponse::json(404, json!({ "message": "Not Found" }))),
        };

        if self.simulate_links
            && request.method == Method::PUT
            && matches!(&reply, Ok(r) if r.is_success())
        {
            self.record_link(&request);
        }

        reply
    }

    fn describe(&self) -> String {
        "fake://upstream".to_string()
    }
}
