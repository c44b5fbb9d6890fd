//! Logical resources and their request policies
//!
//! A [`Resource`] names one thing a call site can ask for. It knows its
//! cache/coordinator key, the [`ResourcePolicy`] governing it and the wire
//! request that fetches or mutates it.

use crate::transport::ApiRequest;
use serde_json::json;
use storegate_core::{
    Credentials, Priority, ProfileUpdate, Registration, AUTH_RATE_KEY, FAVORITES_RATE_KEY,
};

/// Prefix shared by every favorites-related cache key
pub const FAVORITES_PREFIX: &str = "favorites";
/// Cache key of the signed-in user's profile
pub const PROFILE_KEY: &str = "profile";
/// Cache key of the category tree
pub const CATEGORIES_KEY: &str = "categories";

const CATALOG_RATE_KEY: &str = "catalog";
const PROFILE_RATE_KEY: &str = "profile";

/// How the gateway treats one kind of resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourcePolicy {
    pub priority: Priority,
    pub requires_auth: bool,
    /// Serve a stale cached value when the network fails
    pub allow_stale: bool,
    pub cacheable: bool,
    /// Rate-limit window the request is counted against
    pub rate_key: &'static str,
}

impl ResourcePolicy {
    const fn catalog(priority: Priority) -> Self {
        Self {
            priority,
            requires_auth: false,
            allow_stale: true,
            cacheable: true,
            rate_key: CATALOG_RATE_KEY,
        }
    }

    const fn auth() -> Self {
        Self {
            priority: Priority::AUTH,
            requires_auth: false,
            allow_stale: false,
            cacheable: false,
            rate_key: AUTH_RATE_KEY,
        }
    }

    const fn account(rate_key: &'static str, cacheable: bool) -> Self {
        Self {
            priority: Priority::PROFILE,
            requires_auth: true,
            allow_stale: cacheable,
            cacheable,
            rate_key,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Resource {
    Categories,
    Products {
        category: String,
        subcategory: Option<String>,
        page: u32,
        limit: u32,
    },
    Product {
        path: String,
        slug: String,
    },
    Login(Credentials),
    Register(Registration),
    Logout,
    Profile,
    /// One flushed profile batch, numbered so batches never join each other
    ProfileUpdate {
        batch: u64,
        fields: ProfileUpdate,
    },
    Favorites {
        page: u32,
        limit: u32,
    },
    FavoriteStatus(Vec<i64>),
    FavoriteAdd(i64),
    FavoriteRemove(i64),
}

impl Resource {
    pub fn key(&self) -> String {
        match self {
            Resource::Categories => CATEGORIES_KEY.to_string(),
            Resource::Products {
                category,
                subcategory,
                page,
                limit,
            } => format!(
                "products:{category}/{}:{page}:{limit}",
                subcategory.as_deref().unwrap_or("all")
            ),
            Resource::Product { path, slug } => format!("product:{path}:{slug}"),
            Resource::Login(credentials) => format!("auth:login:{}", credentials.username),
            Resource::Register(registration) => {
                format!("auth:register:{}", registration.username)
            }
            Resource::Logout => "auth:logout".to_string(),
            Resource::Profile => PROFILE_KEY.to_string(),
            Resource::ProfileUpdate { batch, .. } => format!("{PROFILE_KEY}:update:{batch}"),
            Resource::Favorites { page, limit } => format!("{FAVORITES_PREFIX}:{page}:{limit}"),
            Resource::FavoriteStatus(ids) => format!(
                "{FAVORITES_PREFIX}:status:{}",
                ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
            ),
            Resource::FavoriteAdd(id) => format!("{FAVORITES_PREFIX}:add:{id}"),
            Resource::FavoriteRemove(id) => format!("{FAVORITES_PREFIX}:remove:{id}"),
        }
    }

    pub fn policy(&self) -> ResourcePolicy {
        match self {
            Resource::Categories => ResourcePolicy::catalog(Priority::CATEGORIES),
            Resource::Products { .. } | Resource::Product { .. } => {
                ResourcePolicy::catalog(Priority::PRODUCTS)
            }
            Resource::Login(_) | Resource::Register(_) => ResourcePolicy::auth(),
            // Sent with whatever credential is left; never refreshes first
            Resource::Logout => ResourcePolicy::auth(),
            Resource::Profile => ResourcePolicy::account(PROFILE_RATE_KEY, true),
            Resource::ProfileUpdate { .. } => ResourcePolicy::account(PROFILE_RATE_KEY, false),
            Resource::Favorites { .. } | Resource::FavoriteStatus(_) => {
                ResourcePolicy::account(FAVORITES_RATE_KEY, true)
            }
            Resource::FavoriteAdd(_) | Resource::FavoriteRemove(_) => {
                ResourcePolicy::account(FAVORITES_RATE_KEY, false)
            }
        }
    }

    pub fn request(&self) -> ApiRequest {
        match self {
            Resource::Categories => ApiRequest::get("/categories"),
            Resource::Products {
                category,
                subcategory,
                page,
                limit,
            } => {
                let path = match subcategory {
                    Some(sub) => format!("/categories/{category}/{sub}"),
                    None => format!("/categories/{category}"),
                };
                ApiRequest::get(path).query("page", page).query("limit", limit)
            }
            Resource::Product { path, slug } => ApiRequest::get(format!(
                "/products/{}/{slug}",
                path.trim_matches('/')
            )),
            Resource::Login(credentials) => {
                ApiRequest::post("/auth/login").json(json!({
                    "username": credentials.username,
                    "password": credentials.password,
                }))
            }
            Resource::Register(registration) => ApiRequest::post("/auth/register").json(json!({
                "username": registration.username,
                "password": registration.password,
                "email": registration.email,
            })),
            Resource::Logout => ApiRequest::post("/auth/logout"),
            Resource::Profile => ApiRequest::get("/auth/profile"),
            Resource::ProfileUpdate { fields, .. } => {
                ApiRequest::put("/auth/profile").json(serde_json::Value::Object(fields.clone()))
            }
            Resource::Favorites { page, limit } => ApiRequest::get("/favorites")
                .query("page", page)
                .query("limit", limit),
            Resource::FavoriteStatus(ids) => {
                ApiRequest::post("/favorites/check-status").json(json!({ "productIds": ids }))
            }
            Resource::FavoriteAdd(id) => {
                ApiRequest::post("/favorites/add").json(json!({ "productId": id }))
            }
            Resource::FavoriteRemove(id) => {
                ApiRequest::post("/favorites/remove").json(json!({ "productId": id }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;

    #[test]
    fn test_keys_follow_resource_families() {
        assert_eq!(Resource::Categories.key(), "categories");
        assert_eq!(
            Resource::Products {
                category: "cpu".into(),
                subcategory: None,
                page: 1,
                limit: 12
            }
            .key(),
            "products:cpu/all:1:12"
        );
        assert_eq!(
            Resource::Products {
                category: "storage".into(),
                subcategory: Some("ssd".into()),
                page: 2,
                limit: 24
            }
            .key(),
            "products:storage/ssd:2:24"
        );
        assert_eq!(
            Resource::Product {
                path: "storage/ssd".into(),
                slug: "evo-970".into()
            }
            .key(),
            "product:storage/ssd:evo-970"
        );
        assert_eq!(Resource::FavoriteStatus(vec![3, 1]).key(), "favorites:status:3,1");
        assert!(Resource::Favorites { page: 1, limit: 12 }
            .key()
            .starts_with(FAVORITES_PREFIX));
    }

    #[test]
    fn test_policies() {
        let categories = Resource::Categories.policy();
        assert!(categories.cacheable && categories.allow_stale && !categories.requires_auth);
        assert_eq!(categories.priority, Priority::CATEGORIES);

        let login = Resource::Login(Credentials {
            username: "alice".into(),
            password: "secret".into(),
        })
        .policy();
        assert!(!login.cacheable && !login.allow_stale);
        assert_eq!(login.rate_key, AUTH_RATE_KEY);
        assert_eq!(login.priority, Priority::AUTH);

        let favorites = Resource::Favorites { page: 1, limit: 12 }.policy();
        assert!(favorites.requires_auth && favorites.cacheable);
        assert_eq!(favorites.priority, Priority::PROFILE);
        assert_eq!(favorites.rate_key, FAVORITES_RATE_KEY);

        let add = Resource::FavoriteAdd(7).policy();
        assert!(add.requires_auth && !add.cacheable);
    }

    #[test]
    fn test_requests() {
        let listing = Resource::Products {
            category: "storage".into(),
            subcategory: Some("ssd".into()),
            page: 2,
            limit: 24,
        }
        .request();
        assert_eq!(listing.method, Method::Get);
        assert_eq!(listing.path, "/categories/storage/ssd");
        assert_eq!(
            listing.query,
            vec![("page".into(), "2".into()), ("limit".into(), "24".into())]
        );

        let product = Resource::Product {
            path: "/cpu/".into(),
            slug: "ryzen-7".into(),
        }
        .request();
        assert_eq!(product.path, "/products/cpu/ryzen-7");

        let status = Resource::FavoriteStatus(vec![1, 2]).request();
        assert_eq!(status.method, Method::Post);
        assert_eq!(status.body, Some(json!({"productIds": [1, 2]})));

        let mut fields = ProfileUpdate::new();
        fields.insert("firstName".into(), json!("Alice"));
        let update = Resource::ProfileUpdate { batch: 1, fields }.request();
        assert_eq!(update.method, Method::Put);
        assert_eq!(update.body, Some(json!({"firstName": "Alice"})));
    }
}
