//! Request pipeline
//!
//! Every network attempt flows through the same named stages:
//!
//! ```text
//! RateLimit -> AuthAttach -> Send -> Classify -> RetryOrSettle
//! ```
//!
//! The coordinator owns `RateLimit` and `RetryOrSettle`; [`Pipeline`]
//! implements the three stages in between, including the single refresh
//! allowed after a 401.

use crate::token::TokenManager;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use storegate_core::{generic_message, Error, FieldError, LogoutReason, Result};
use tracing::{debug, warn};

/// Named stages of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RateLimit,
    AuthAttach,
    Send,
    Classify,
    RetryOrSettle,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::RateLimit => "rate_limit",
            Stage::AuthAttach => "auth_attach",
            Stage::Send => "send",
            Stage::Classify => "classify",
            Stage::RetryOrSettle => "retry_or_settle",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auth-attach, send and classify for a single attempt
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenManager>,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenManager>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            tokens,
            timeout,
        }
    }

    /// Run one attempt of `request`
    ///
    /// A 401 on an authenticated attempt triggers exactly one refresh and
    /// resend. A second 401 ends the session. Other requests still carry the
    /// current credential when there is one, but a 401 on them is an ordinary
    /// rejection.
    pub async fn execute(&self, request: ApiRequest, requires_auth: bool) -> Result<Value> {
        let token = self.attach(&request.path, requires_auth).await?;

        match self.send(request.clone(), token.clone(), requires_auth).await {
            Err(error) if error.is_auth_expired() => {
                let Some(sent) = token else {
                    return Err(error);
                };
                debug!(
                    stage = %Stage::AuthAttach,
                    endpoint = %request.path,
                    "unauthorized_refreshing"
                );

                let Some(renewed) = self.tokens.handle_unauthorized(&sent).await? else {
                    return Err(Error::auth_expired("the session has ended"));
                };

                match self.send(request.clone(), Some(renewed), true).await {
                    Err(error) if error.is_auth_expired() => {
                        warn!(endpoint = %request.path, "unauthorized_after_refresh");
                        self.tokens.logout(LogoutReason::TokenExpired);
                        Err(error)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn attach(&self, endpoint: &str, requires_auth: bool) -> Result<Option<String>> {
        if !requires_auth {
            return Ok(self.tokens.current());
        }
        match self.tokens.refresh_if_needed().await? {
            Some(token) => Ok(Some(token)),
            None => {
                debug!(stage = %Stage::AuthAttach, endpoint = %endpoint, "no_session");
                Err(Error::not_authenticated(endpoint))
            }
        }
    }

    async fn send(
        &self,
        mut request: ApiRequest,
        token: Option<String>,
        requires_auth: bool,
    ) -> Result<Value> {
        request.bearer = token;
        let endpoint = request.path.clone();
        let authenticated = requires_auth && request.bearer.is_some();
        debug!(
            stage = %Stage::Send,
            method = %request.method,
            endpoint = %endpoint,
            authenticated,
            "sending"
        );

        let sent = tokio::time::timeout(self.timeout, self.transport.send(request)).await;
        let response = match sent {
            Ok(response) => response?,
            Err(_) => return Err(Error::timeout(endpoint, self.timeout)),
        };

        debug!(
            stage = %Stage::Classify,
            endpoint = %endpoint,
            status = response.status,
            "received"
        );
        classify_response(&endpoint, authenticated, response)
    }
}

/// Map a response to its body or to a typed error
///
/// A 401 only means an expired session when a credential was sent; without
/// one it is an ordinary rejection (wrong password, for instance).
pub fn classify_response(
    endpoint: &str,
    authenticated: bool,
    response: ApiResponse,
) -> Result<Value> {
    if response.is_success() {
        return Ok(response.body);
    }

    let status = response.status;
    let message = server_message(&response.body)
        .unwrap_or_else(|| generic_message(status).to_string());

    Err(match status {
        400 => match validation_fields(&response.body) {
            Some(fields) => Error::validation(message, fields),
            None => Error::rejected(endpoint, status, message),
        },
        401 if authenticated => Error::auth_expired(message),
        404 => Error::not_found(endpoint, message),
        429 => Error::rate_limited(endpoint, response.retry_after, message),
        500..=599 => Error::server(endpoint, status, message),
        _ => Error::rejected(endpoint, status, message),
    })
}

fn server_message(body: &Value) -> Option<String> {
    let text = match body {
        Value::Object(map) => map.get("message").and_then(Value::as_str),
        Value::String(text) => Some(text.as_str()),
        _ => None,
    }?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn validation_fields(body: &Value) -> Option<Vec<FieldError>> {
    let errors = body.get("errors")?.as_array()?;
    Some(
        errors
            .iter()
            .map(|item| match item {
                Value::String(message) => FieldError {
                    field: String::new(),
                    message: message.clone(),
                },
                other => FieldError {
                    field: ["path", "param", "field"]
                        .iter()
                        .find_map(|name| other.get(*name).and_then(Value::as_str))
                        .unwrap_or_default()
                        .to_string(),
                    message: ["msg", "message"]
                        .iter()
                        .find_map(|name| other.get(*name).and_then(Value::as_str))
                        .unwrap_or_default()
                        .to_string(),
                },
            })
            .collect(),
    )
}
