//! reqwest-backed [`Upstream`] with API-key authentication.

use async_trait::async_trait;
use reqwest::header;

use super::{Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};
use crate::config::UpstreamConfig;

pub struct HttpUpstream {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = format!("{}{}", self.base_url, request.path);
        log::debug!("[UPSTREAM] {} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header("x-api-key", &self.api_key)
            .header(header::ACCEPT, "application/json");

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;

        if !(200..300).contains(&status) {
            log::debug!("[UPSTREAM] {} {} -> {}", request.method, url, status);
        }

        Ok(UpstreamResponse::new(status, text))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
