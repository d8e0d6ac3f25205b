//! Client for the in-app wallet inventory service.

use std::sync::Arc;

use serde_json::json;

use super::{segment, Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};

#[derive(Clone)]
pub struct InventoryClient {
    upstream: Arc<dyn Upstream>,
}

impl InventoryClient {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    pub fn describe(&self) -> String {
        self.upstream.describe()
    }

    pub async fn connect_wallet(&self, user_address: &str) -> Result<UpstreamResponse, UpstreamError> {
        self.upstream
            .send(UpstreamRequest::post(
                "/wallet/connect",
                json!({ "userAddress": user_address }),
            ))
            .await
    }

    pub async fn get_wallet(&self, address: &str) -> Result<UpstreamResponse, UpstreamError> {
        self.upstream
            .send(UpstreamRequest::get(format!("/wallet/{}", segment(address))))
            .await
    }
}
