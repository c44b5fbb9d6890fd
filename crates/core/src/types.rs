use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::errors::{Error, Result};

/// Scheduling and retention weight attached to every request and cache entry
///
/// Higher weights are dequeued first, wait less under rate limiting and
/// survive cache eviction longer. Weights are always finite and positive.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Priority(f64);

impl Priority {
    /// Login, registration and token refresh
    pub const AUTH: Priority = Priority(4.0);
    /// Profile reads and writes, favorites
    pub const PROFILE: Priority = Priority(3.0);
    /// The category tree
    pub const CATEGORIES: Priority = Priority(2.5);
    /// Product listings and product pages
    pub const PRODUCTS: Priority = Priority(2.0);
    /// Everything else
    pub const DEFAULT: Priority = Priority(1.0);

    /// Create a priority from a raw weight
    pub fn new(weight: f64) -> Result<Self> {
        if weight.is_finite() && weight > 0.0 {
            Ok(Self(weight))
        } else {
            Err(Error::configuration(format!(
                "priority weight must be finite and positive, got {weight}"
            )))
        }
    }

    /// The raw weight
    #[must_use]
    pub fn weight(self) -> f64 {
        self.0
    }

    /// Whether this priority may use the burst allowance
    #[must_use]
    pub fn is_elevated(self) -> bool {
        self > Self::DEFAULT
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let weight = f64::deserialize(deserializer)?;
        Priority::new(weight).map_err(serde::de::Error::custom)
    }
}

/// A node of the category tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub russian_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Category>,
    #[serde(
        default,
        rename = "productCount",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_count: Option<u64>,
}

impl Category {
    /// Find a direct child by its short name
    #[must_use]
    pub fn child(&self, short_name: &str) -> Option<&Category> {
        self.children.iter().find(|c| c.short_name == short_name)
    }
}

/// A named product attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

/// A product as returned by listings and product pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characteristics: Vec<Characteristic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<Category>,
}

/// One page of a category listing
///
/// A category either lists products or, when it has subcategories, lists
/// those instead; exactly one of the two vectors is normally populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<Product>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
    pub total_pages: u32,
    pub current_page: u32,
}

/// One page of the signed-in user's favorites
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesPage {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub current_page: u32,
}

/// Which of the queried products are favorites
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    #[serde(default)]
    pub favorite_product_ids: Vec<i64>,
}

/// Login request body
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration request body
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Answer of the login, register and refresh endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Account details of the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
}

/// Partial profile object accumulated from field edits
pub type ProfileUpdate = serde_json::Map<String, serde_json::Value>;

/// Answer of a profile update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSaved {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_info: Option<Profile>,
}

/// Plain acknowledgement returned by mutating endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Accept either a JSON string or a JSON number and keep its textual form
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}
