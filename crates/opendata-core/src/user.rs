//! User accounts and roles
//!
//! The [`User`] document carries the profile, the roles, the login tracking
//! fields and the API key of a portal account. Users are exportable records:
//! every public attribute is readable through [`Record::attribute`].

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};
use ulid::Ulid;
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::metrics::{MetricDescriptor, MetricRegistry};
use crate::record::{Record, RecordKind, Value};
use crate::text::{slugify, strip_markdown};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Ulid);

impl UserId {
    /// Generate a new unique UserId.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for UserId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| CoreError::InvalidUserId(format!("{s}: {e}")))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Roles
// ============================================================================

/// A named permission group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Role {
    /// Name of the site administrator role.
    pub const ADMIN: &'static str = "admin";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn admin() -> Self {
        Self {
            name: Self::ADMIN.to_string(),
            description: Some("Site administrator".to_string()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
// User
// ============================================================================

/// Record kind of [`User`].
pub static USER_KIND: RecordKind = RecordKind::new(
    "User",
    &[
        "id",
        "slug",
        "email",
        "active",
        "roles",
        "first_name",
        "last_name",
        "fullname",
        "avatar_url",
        "website",
        "about",
        "prefered_language",
        "created_at",
        "confirmed_at",
        "last_login_at",
        "current_login_at",
        "last_login_ip",
        "current_login_ip",
        "login_count",
        "deleted",
        "sysadmin",
        "visible",
    ],
);

/// Metric names registered against users.
pub const USER_METRICS: [&str; 3] = ["datasets", "reuses", "followers"];

/// Register the user metrics into `registry`.
pub fn register_user_metrics(registry: &mut MetricRegistry) {
    for name in USER_METRICS {
        registry.register(&USER_KIND, MetricDescriptor::int(name));
    }
}

/// A portal user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: UserId,
    #[serde(default)]
    pub slug: String,
    pub email: String,
    /// Password hash; never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub roles: Vec<Role>,

    pub first_name: String,
    pub last_name: String,

    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub prefered_language: Option<String>,

    #[serde(default, skip_serializing)]
    apikey: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_ip: Option<String>,
    #[serde(default)]
    pub current_login_ip: Option<String>,
    #[serde(default)]
    pub login_count: u32,

    #[serde(default)]
    pub deleted: Option<DateTime<Utc>>,

    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

fn default_active() -> bool {
    true
}

/// Claims carried by a signed API key.
#[derive(Debug, Serialize, Deserialize)]
struct ApiKeyClaims {
    user: String,
    time: f64,
}

impl User {
    /// Create an active account; the slug is populated from the full name.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        let mut user = Self {
            id: UserId::new(),
            slug: String::new(),
            email: email.into(),
            password: None,
            active: true,
            roles: Vec::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            avatar_url: None,
            website: None,
            about: None,
            prefered_language: None,
            apikey: None,
            created_at: Utc::now(),
            confirmed_at: None,
            last_login_at: None,
            current_login_at: None,
            last_login_ip: None,
            current_login_ip: None,
            login_count: 0,
            deleted: None,
            metrics: BTreeMap::new(),
            extras: BTreeMap::new(),
        };
        user.populate_slug();
        user
    }

    /// "First Last", trimmed.
    pub fn fullname(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Fill an empty slug from the full name.
    pub fn populate_slug(&mut self) {
        if self.slug.is_empty() {
            self.slug = slugify(&self.fullname());
        }
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    /// Whether the user holds the administrator role.
    pub fn sysadmin(&self) -> bool {
        self.has_role(Role::ADMIN)
    }

    fn metric_count(&self, name: &str) -> i64 {
        self.metrics.get(name).and_then(Value::as_i64).unwrap_or(0)
    }

    /// Active users who published at least one dataset or reuse.
    pub fn visible(&self) -> bool {
        self.metric_count("datasets") + self.metric_count("reuses") > 0 && self.active
    }

    pub fn datasets_count(&self) -> i64 {
        self.metric_count("datasets")
    }

    pub fn followers_count(&self) -> i64 {
        self.metric_count("followers")
    }

    pub fn set_metric(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.metrics.insert(name.into(), value.into());
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// Set or clear the website, rejecting malformed URLs.
    pub fn set_website(&mut self, website: Option<&str>) -> CoreResult<()> {
        self.website = validate_url("website", website)?;
        Ok(())
    }

    /// Set or clear the avatar URL, rejecting malformed URLs.
    pub fn set_avatar_url(&mut self, avatar_url: Option<&str>) -> CoreResult<()> {
        self.avatar_url = validate_url("avatar_url", avatar_url)?;
        Ok(())
    }

    pub fn apikey(&self) -> Option<&str> {
        self.apikey.as_deref()
    }

    /// Generate and store a signed API key identifying this user.
    pub fn generate_api_key(&mut self, secret: &[u8], now: DateTime<Utc>) -> CoreResult<&str> {
        let claims = ApiKeyClaims {
            user: self.id.to_string(),
            time: now.timestamp_millis() as f64 / 1000.0,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )?;

        debug!(user_id = %self.id, "Generated API key");
        Ok(self.apikey.insert(token).as_str())
    }

    pub fn clear_api_key(&mut self) {
        self.apikey = None;
    }

    /// Verify an API key signature and return the user it identifies.
    pub fn verify_api_key(secret: &[u8], token: &str) -> CoreResult<UserId> {
        let mut validation = Validation::default();
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<ApiKeyClaims>(
            token,
            &DecodingKey::from_secret(secret),
            &validation,
        )
        .map_err(|e| CoreError::InvalidApiKey(e.to_string()))?;

        data.claims.user.parse()
    }

    /// Track a successful login.
    pub fn record_login(&mut self, ip: Option<&str>, now: DateTime<Utc>) {
        self.last_login_at = self.current_login_at.or(Some(now));
        self.last_login_ip = self
            .current_login_ip
            .take()
            .or_else(|| ip.map(str::to_string));
        self.current_login_at = Some(now);
        self.current_login_ip = ip.map(str::to_string);
        self.login_count += 1;
    }

    /// schema.org `Person` description of the user.
    pub fn json_ld(&self) -> serde_json::Value {
        let mut result = serde_json::json!({
            "@type": "Person",
            "@context": "http://schema.org",
            "name": self.fullname(),
        });

        if let Some(about) = self.about.as_deref().filter(|a| !a.is_empty()) {
            result["description"] = strip_markdown(about).into();
        }
        if let Some(avatar_url) = &self.avatar_url {
            result["image"] = avatar_url.clone().into();
        }
        if let Some(website) = &self.website {
            result["url"] = website.clone().into();
        }

        result
    }

    /// Anonymize the account in place.
    ///
    /// Memberships, discussions and follows referencing the user live in
    /// other collections and are not touched here.
    pub fn mark_as_deleted(&mut self, now: DateTime<Utc>) {
        self.email = format!("{}@deleted", self.id);
        self.password = None;
        self.apikey = None;
        self.active = false;
        self.first_name = "DELETED".to_string();
        self.last_name = "DELETED".to_string();
        self.avatar_url = None;
        self.website = None;
        self.about = None;
        self.deleted = Some(now);

        info!(user_id = %self.id, "User account marked as deleted");
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }
}

fn validate_url(field: &'static str, value: Option<&str>) -> CoreResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => Url::parse(raw)
            .map(|url| Some(url.to_string()))
            .map_err(|e| CoreError::InvalidUrl {
                field,
                reason: e.to_string(),
            }),
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fullname())
    }
}

impl Record for User {
    fn kind() -> &'static RecordKind {
        &USER_KIND
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.to_string().into(),
            "slug" => self.slug.clone().into(),
            "email" => self.email.clone().into(),
            "active" => self.active.into(),
            "roles" => Value::List(
                self.roles
                    .iter()
                    .map(|r| Value::Text(r.name.clone()))
                    .collect(),
            ),
            "first_name" => self.first_name.clone().into(),
            "last_name" => self.last_name.clone().into(),
            "fullname" => self.fullname().into(),
            "avatar_url" => self.avatar_url.clone().into(),
            "website" => self.website.clone().into(),
            "about" => self.about.clone().into(),
            "prefered_language" => self.prefered_language.clone().into(),
            "created_at" => self.created_at.into(),
            "confirmed_at" => self.confirmed_at.into(),
            "last_login_at" => self.last_login_at.into(),
            "current_login_at" => self.current_login_at.into(),
            "last_login_ip" => self.last_login_ip.clone().into(),
            "current_login_ip" => self.current_login_ip.clone().into(),
            "login_count" => self.login_count.into(),
            "deleted" => self.deleted.into(),
            "sysadmin" => self.sysadmin().into(),
            "visible" => self.visible().into(),
            _ => return None,
        };
        Some(value)
    }

    fn metric(&self, name: &str) -> Option<Value> {
        self.metrics.get(name).cloned()
    }
}
