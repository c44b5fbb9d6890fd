#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use storegate_cache::{KeyValueStore, MemoryStore};
use storegate_client::{ApiRequest, ApiResponse, Gateway, Method, Transport};
use storegate_config::GatewayConfig;
use storegate_core::{Error, Result, TOKEN_STORAGE_KEY};

type Route = (Method, String);

/// In-process transport answering from per-route scripts
///
/// Each route plays its responses in order; the last one repeats. Unknown
/// routes answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<Route, VecDeque<Result<ApiResponse>>>>,
    seen: Mutex<Vec<ApiRequest>>,
    latency: Mutex<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(self: Arc<Self>, latency: Duration) -> Arc<Self> {
        *self.latency.lock() = latency;
        self
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Ok(ApiResponse::new(status, body)))
    }

    pub fn fail(&self, method: Method, path: &str, error: Error) -> &Self {
        self.push(method, path, Err(error))
    }

    pub fn push(&self, method: Method, path: &str, outcome: Result<ApiResponse>) -> &Self {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.seen
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub fn total_calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.seen.lock().push(request.clone());
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let outcome = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&(request.method, request.path.clone())) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => None,
            }
        };
        outcome.unwrap_or_else(|| Ok(ApiResponse::new(404, json!({"message": "no such route"}))))
    }
}

/// An unsigned JWT expiring `seconds` from now
pub fn jwt(seconds: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + seconds;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({"id": 1, "exp": exp}).to_string());
    format!("{header}.{payload}.signature")
}

pub fn memory_store(token: Option<&str>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    if let Some(token) = token {
        store.set(TOKEN_STORAGE_KEY, token).unwrap();
    }
    store
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.rate_limit.min_backoff_ms = 100;
    config.rate_limit.max_backoff_ms = 1000;
    config.request.jitter_factor = 0.0;
    config
}

pub fn gateway(transport: &Arc<ScriptedTransport>, store: &Arc<MemoryStore>) -> Gateway {
    gateway_with(transport, store, test_config())
}

pub fn gateway_with(
    transport: &Arc<ScriptedTransport>,
    store: &Arc<MemoryStore>,
    config: GatewayConfig,
) -> Gateway {
    Gateway::builder()
        .config(config)
        .transport(transport.clone())
        .store(store.clone())
        .build()
        .unwrap()
}

pub fn category_tree() -> Value {
    json!([
        {
            "id": 1,
            "name": "Processors",
            "short_name": "cpu",
            "children": []
        },
        {
            "id": 2,
            "name": "Storage",
            "short_name": "storage",
            "children": [
                {"id": 3, "name": "SSD", "short_name": "ssd"}
            ]
        }
    ])
}

pub fn product_json(id: i64, slug: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "price": "199.99",
        "slug": slug
    })
}
