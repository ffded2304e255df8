//! reqwest-backed [`Origin`].

use crate::config::OriginConfig;
use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use modproxy_api::{Origin, OriginRequest, OriginResponse, TransportError, TransportResult};
use reqwest::Client;
use reqwest::header::IF_NONE_MATCH;

pub struct HttpOrigin {
    client: Client,
}

impl HttpOrigin {
    pub fn new(config: &OriginConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ProxyError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn get(&self, request: &OriginRequest) -> TransportResult<OriginResponse> {
        let mut builder = self.client.get(&request.url);
        if let Some(etag) = &request.if_none_match {
            builder = builder.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(OriginResponse::new(status, headers, body))
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_builder() {
        TransportError::Request(err.to_string())
    } else {
        TransportError::Connect(err.to_string())
    }
}
