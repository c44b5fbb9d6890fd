//! Resource-level facade
//!
//! [`Gateway`] is what call sites talk to. Each operation maps to a
//! [`Resource`], is answered from the cache when a fresh value exists and
//! otherwise goes through the coordinator. When the network ultimately fails,
//! a stale cached value is served instead of the error if the resource allows
//! it.

use crate::coordinator::{RequestCoordinator, RunFn};
use crate::pipeline::Pipeline;
use crate::profile::{FlushFn, PendingUpdate, ProfileBatcher};
use crate::resources::{Resource, CATEGORIES_KEY, FAVORITES_PREFIX, PROFILE_KEY};
use crate::token::{HttpRefresher, TokenManager, TokenManagerConfig, TokenPhase, TokenRefresher};
use crate::transport::{HttpTransport, Transport};
use futures::future::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use storegate_cache::{CacheConfig, CacheStats, CacheStore, FileStore, KeyValueStore, MemoryStore};
use storegate_config::GatewayConfig;
use storegate_core::{
    Category, Credentials, Error, FavoriteStatus, FavoritesPage, Listing, LogoutReason,
    MessageResponse, Product, Profile, ProfileSaved, ProfileUpdate, Registration, Result,
    SessionEvent, SessionEvents, TokenResponse,
};
use storegate_utils::{RateLimitStatus, RateLimiter, RetryPolicy};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Builds a [`Gateway`] from configuration plus optional injected parts
///
/// Anything not injected is created from the configuration: an
/// [`HttpTransport`] for the base URL and a [`FileStore`] at the configured
/// state path.
pub struct GatewayBuilder {
    config: GatewayConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    events: Option<SessionEvents>,
}

impl GatewayBuilder {
    fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            transport: None,
            store: None,
            refresher: None,
            events: None,
        }
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Keep all durable state in memory
    pub fn in_memory(self) -> Self {
        self.store(Arc::new(MemoryStore::new()))
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let config = self.config;
        config.validate()?;
        let timeout = config.request_timeout();

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config.request.base_url, timeout)?),
        };
        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileStore::open(config.storage.resolved_path())?),
        };
        let refresher = self
            .refresher
            .unwrap_or_else(|| Arc::new(HttpRefresher::new(Arc::clone(&transport), timeout)));
        let events = self.events.unwrap_or_default();

        let cache = Arc::new(CacheStore::new(CacheConfig::new(
            config.cache.max_size,
            config.cache_ttl(),
            config.cache_stale_ttl(),
        )?));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_config()));
        let tokens = TokenManager::new(
            TokenManagerConfig {
                storage_key: config.auth.token_key.clone(),
                refresh_threshold: config.refresh_threshold(),
            },
            store,
            refresher,
            Arc::clone(&cache),
            Arc::clone(&limiter),
            events.clone(),
        );
        let coordinator = RequestCoordinator::new(
            Arc::clone(&limiter),
            RetryPolicy::new(config.retry_config()),
            config.request.max_concurrent,
        );
        let pipeline = Pipeline::new(transport, Arc::clone(&tokens), timeout);

        let core = Arc::new(Core {
            cache,
            limiter,
            tokens,
            coordinator,
            pipeline,
        });
        let profile = ProfileBatcher::new(config.batch_delay(), profile_flush(Arc::clone(&core)));

        debug!(
            base_url = %config.request.base_url,
            authenticated = core.tokens.is_authenticated(),
            "gateway_ready"
        );
        Ok(Gateway {
            core,
            profile,
            events,
            config,
        })
    }
}

/// Shared machinery behind the facade
struct Core {
    cache: Arc<CacheStore<Value>>,
    limiter: Arc<RateLimiter>,
    tokens: Arc<TokenManager>,
    coordinator: Arc<RequestCoordinator>,
    pipeline: Pipeline,
}

impl Core {
    async fn fetch(self: &Arc<Self>, resource: Resource) -> Result<Value> {
        let key = resource.key();
        let policy = resource.policy();

        let fallback = if policy.cacheable {
            match self.cache.get(&key, policy.allow_stale) {
                Some(hit) if !hit.stale => return Ok(hit.value),
                stale => stale,
            }
        } else {
            None
        };

        let pending = self.coordinator.enqueue(
            &key,
            policy.rate_key,
            policy.priority,
            self.run_for(&resource),
        );

        match pending.await {
            Ok(value) => Ok(value),
            Err(error) => match fallback {
                Some(stale) if !is_session_error(&error) => {
                    warn!(
                        key = %key,
                        age_ms = stale.age.as_millis() as u64,
                        error = %error,
                        "serving_stale_after_failure"
                    );
                    Ok(stale.value)
                }
                _ => Err(error),
            },
        }
    }

    fn run_for(self: &Arc<Self>, resource: &Resource) -> RunFn {
        let core = Arc::clone(self);
        let key = resource.key();
        let policy = resource.policy();
        let request = resource.request();

        Arc::new(move || {
            let core = Arc::clone(&core);
            let key = key.clone();
            let request = request.clone();
            async move {
                let value = core.pipeline.execute(request, policy.requires_auth).await?;
                // A logout may have happened while the request was out
                if policy.cacheable && (!policy.requires_auth || core.tokens.is_authenticated()) {
                    core.cache.set(key, value.clone(), policy.priority);
                }
                Ok(value)
            }
            .boxed()
        })
    }

    async fn fetch_as<T: DeserializeOwned>(self: &Arc<Self>, resource: Resource) -> Result<T> {
        let what = resource.key();
        let value = self.fetch(resource).await?;
        decode(&what, value)
    }
}

fn profile_flush(core: Arc<Core>) -> FlushFn {
    Arc::new(move |batch: u64, fields: ProfileUpdate| {
        let core = Arc::clone(&core);
        async move {
            let saved: ProfileSaved = core
                .fetch_as(Resource::ProfileUpdate { batch, fields })
                .await?;
            core.cache.remove(PROFILE_KEY);
            info!(batch, "profile_saved");
            Ok(saved)
        }
        .boxed()
    })
}

fn is_session_error(error: &Error) -> bool {
    matches!(
        error,
        Error::AuthExpired { .. } | Error::NotAuthenticated { .. }
    )
}

fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::decode(what, e.to_string()))
}

/// Bring a listing answer into the `{products|categories, totalPages,
/// currentPage}` shape
///
/// A bare array is a single page of products. Missing page counters default
/// to 1.
pub fn normalize_listing(value: Value) -> Result<Listing> {
    let mut object = match value {
        Value::Array(products) => {
            let mut object = Map::new();
            object.insert("products".to_string(), Value::Array(products));
            object
        }
        Value::Object(object) => object,
        other => {
            return Err(Error::decode(
                "product listing",
                format!("expected an object or array, got {other}"),
            ))
        }
    };

    for counter in ["totalPages", "currentPage"] {
        let usable = object.get(counter).is_some_and(Value::is_u64);
        if !usable {
            object.insert(counter.to_string(), Value::from(1u32));
        }
    }
    decode("product listing", Value::Object(object))
}

/// Attach the category records matching the product path
fn enrich_product(product: &mut Product, path: &str, tree: &[Category]) {
    let mut segments = path.trim_matches('/').split('/').filter(|s| !s.is_empty());
    let Some(category) = segments
        .next()
        .and_then(|name| tree.iter().find(|c| c.short_name == name))
    else {
        return;
    };

    if let Some(sub) = segments.next().and_then(|name| category.child(name)) {
        product.subcategory = Some(sub.clone());
    }
    product.category = Some(category.clone());
}

/// The resilient request gateway
pub struct Gateway {
    core: Arc<Core>,
    profile: Arc<ProfileBatcher>,
    events: SessionEvents,
    config: GatewayConfig,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The category tree
    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.core.fetch_as(Resource::Categories).await
    }

    /// One page of a category or subcategory listing
    pub async fn products(
        &self,
        category: &str,
        subcategory: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Listing> {
        let value = self
            .core
            .fetch(Resource::Products {
                category: category.to_string(),
                subcategory: subcategory.map(str::to_string),
                page,
                limit,
            })
            .await?;
        normalize_listing(value)
    }

    /// A product by category path and slug, with its category records attached
    ///
    /// Failing to load the category tree leaves the product unenriched.
    pub async fn product(&self, path: &str, slug: &str) -> Result<Product> {
        let mut product: Product = self
            .core
            .fetch_as(Resource::Product {
                path: path.trim_matches('/').to_string(),
                slug: slug.to_string(),
            })
            .await?;

        match self.categories().await {
            Ok(tree) => enrich_product(&mut product, path, &tree),
            Err(e) => debug!(error = %e, "product_not_enriched"),
        }
        Ok(product)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let resource = Resource::Login(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self.authenticate(resource).await
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<TokenResponse> {
        let resource = Resource::Register(Registration {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
        });
        self.authenticate(resource).await
    }

    async fn authenticate(&self, resource: Resource) -> Result<TokenResponse> {
        let what = resource.key();
        let answer: TokenResponse = self.core.fetch_as(resource).await?;
        let token = answer
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::decode(what, "no token in response"))?;

        self.core.tokens.set_token(token)?;
        // Responses cached for a previous identity must not leak
        self.core.cache.clear();
        Ok(answer)
    }

    /// End the session
    ///
    /// The server is told on a best-effort basis; local state is cleared
    /// whatever it answers.
    pub async fn logout(&self) {
        self.profile.discard();
        if self.core.tokens.is_authenticated() {
            if let Err(e) = self.core.fetch(Resource::Logout).await {
                warn!(error = %e, "server_logout_failed");
            }
        }
        self.core.tokens.logout(LogoutReason::UserRequested);
    }

    pub async fn profile(&self) -> Result<Profile> {
        self.core.fetch_as(Resource::Profile).await
    }

    /// Queue one profile field edit
    ///
    /// The returned handle resolves once the batch containing the edit has
    /// been saved.
    pub fn update_profile_field(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<PendingUpdate> {
        if !self.core.tokens.is_authenticated() {
            return Err(Error::not_authenticated("profile update"));
        }
        Ok(self.profile.update_field(field, value.into()))
    }

    /// Save pending profile edits without waiting for the batch window
    ///
    /// Returns `None` when no edit was pending.
    pub async fn save_profile_now(&self) -> Result<Option<ProfileSaved>> {
        self.profile.flush_now().await.transpose()
    }

    pub async fn favorites(&self, page: u32, limit: u32) -> Result<FavoritesPage> {
        self.core.fetch_as(Resource::Favorites { page, limit }).await
    }

    /// Which of `ids` are among the user's favorites
    pub async fn favorite_status(&self, ids: &[i64]) -> Result<FavoriteStatus> {
        if ids.is_empty() {
            return Ok(FavoriteStatus::default());
        }
        self.core
            .fetch_as(Resource::FavoriteStatus(ids.to_vec()))
            .await
    }

    pub async fn add_favorite(&self, product_id: i64) -> Result<MessageResponse> {
        self.mutate_favorites(Resource::FavoriteAdd(product_id)).await
    }

    pub async fn remove_favorite(&self, product_id: i64) -> Result<MessageResponse> {
        self.mutate_favorites(Resource::FavoriteRemove(product_id))
            .await
    }

    async fn mutate_favorites(&self, resource: Resource) -> Result<MessageResponse> {
        let answer = self.core.fetch_as(resource).await?;
        self.core.cache.remove_prefix(FAVORITES_PREFIX);
        Ok(answer)
    }

    /// Drop the cached category tree so the next read refetches it
    pub fn invalidate_categories(&self) -> bool {
        self.core.cache.remove(CATEGORIES_KEY)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.core.tokens.is_authenticated()
    }

    pub fn token_phase(&self) -> TokenPhase {
        self.core.tokens.phase()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.core.cache.stats()
    }

    pub fn rate_limit_status(&self, key: &str) -> RateLimitStatus {
        self.core.limiter.status(key)
    }
}
