use crate::pipeline::classify_response;
use crate::transport::{ApiRequest, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use storegate_core::{Error, Result, TokenResponse};

/// Exchanges a still-accepted token for a new one
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, token: &str) -> Result<String>;
}

/// Refresh through `POST /auth/refresh`
pub struct HttpRefresher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl HttpRefresher {
    pub const PATH: &'static str = "/auth/refresh";

    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, token: &str) -> Result<String> {
        let request = ApiRequest::post(Self::PATH).bearer(token);
        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| Error::timeout(Self::PATH, self.timeout))??;

        let body = classify_response(Self::PATH, true, response)?;
        let answer: TokenResponse = serde_json::from_value(body)?;
        answer
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::decode("refresh response", "no token in response"))
    }
}
