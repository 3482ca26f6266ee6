//! Typed configuration sections and their JSON override forms.

use serde::{Deserialize, Serialize};

/// Placeholder client id that puts the identity client in demo mode.
pub const DEMO_CLIENT_ID: &str = "DEMO_CLIENT_ID";
/// Placeholder client secret used alongside [`DEMO_CLIENT_ID`].
pub const DEMO_CLIENT_SECRET: &str = "DEMO_CLIENT_SECRET";
/// Subdomain used when none is configured.
pub const DEMO_SUBDOMAIN: &str = "demo-company";

/// OneLogin API credentials and location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneLoginConfig {
    /// OAuth client id. Empty means demo mode.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,

    /// API region (e.g., "us", "eu").
    #[serde(default = "default_region")]
    pub region: String,

    /// Account subdomain (e.g., "acme" for acme.onelogin.com).
    #[serde(default)]
    pub subdomain: String,
}

fn default_region() -> String {
    "us".to_string()
}

impl Default for OneLoginConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            region: default_region(),
            subdomain: String::new(),
        }
    }
}

impl OneLoginConfig {
    /// Read credentials from `ONELOGIN_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            client_id: std::env::var("ONELOGIN_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("ONELOGIN_CLIENT_SECRET").unwrap_or_default(),
            region: std::env::var("ONELOGIN_REGION").unwrap_or_else(|_| default_region()),
            subdomain: std::env::var("ONELOGIN_SUBDOMAIN").unwrap_or_default(),
        }
    }

    /// Client id, falling back to the demo placeholder.
    pub fn effective_client_id(&self) -> &str {
        non_empty_or(&self.client_id, DEMO_CLIENT_ID)
    }

    /// Client secret, falling back to the demo placeholder.
    pub fn effective_client_secret(&self) -> &str {
        non_empty_or(&self.client_secret, DEMO_CLIENT_SECRET)
    }

    /// Region, falling back to "us".
    pub fn effective_region(&self) -> &str {
        non_empty_or(&self.region, "us")
    }

    /// Subdomain, falling back to the demo company.
    pub fn effective_subdomain(&self) -> &str {
        non_empty_or(&self.subdomain, DEMO_SUBDOMAIN)
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// SAML service provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamlSettings {
    /// SP Entity ID (issuer of our AuthnRequests).
    #[serde(default = "default_entity_id")]
    pub entity_id: String,

    /// Assertion Consumer Service URL.
    #[serde(default = "default_acs_url")]
    pub acs_url: String,

    /// Single Logout Service URL.
    #[serde(default = "default_sls_url")]
    pub sls_url: String,
}

fn default_entity_id() -> String {
    "https://localhost:5000/saml/metadata".to_string()
}

fn default_acs_url() -> String {
    "https://localhost:5000/saml/acs".to_string()
}

fn default_sls_url() -> String {
    "https://localhost:5000/saml/sls".to_string()
}

impl Default for SamlSettings {
    fn default() -> Self {
        Self {
            entity_id: default_entity_id(),
            acs_url: default_acs_url(),
            sls_url: default_sls_url(),
        }
    }
}

/// A downstream application users get access to after provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub enabled: bool,
}

impl ApplicationConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            enabled: true,
        }
    }
}

/// User database location (reported only; nothing is persisted).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: String,
}

/// Log level and log file location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter (e.g., "INFO", "debug").
    #[serde(default = "default_level")]
    pub level: String,

    /// File the binary writes to when file logging is requested.
    #[serde(default)]
    pub file: String,
}

fn default_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: String::new(),
        }
    }
}

/// Partial override of [`OneLoginConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OneLoginConfigJson {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub region: Option<String>,
    pub subdomain: Option<String>,
}

impl OneLoginConfigJson {
    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut OneLoginConfig) {
        if let Some(ref id) = self.client_id {
            config.client_id = id.clone();
        }
        if let Some(ref secret) = self.client_secret {
            config.client_secret = secret.clone();
        }
        if let Some(ref region) = self.region {
            config.region = region.clone();
        }
        if let Some(ref subdomain) = self.subdomain {
            config.subdomain = subdomain.clone();
        }
    }
}

/// Partial override of [`SamlSettings`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SamlSettingsJson {
    pub entity_id: Option<String>,
    pub acs_url: Option<String>,
    pub sls_url: Option<String>,
}

impl SamlSettingsJson {
    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut SamlSettings) {
        if let Some(ref entity_id) = self.entity_id {
            config.entity_id = entity_id.clone();
        }
        if let Some(ref acs_url) = self.acs_url {
            config.acs_url = acs_url.clone();
        }
        if let Some(ref sls_url) = self.sls_url {
            config.sls_url = sls_url.clone();
        }
    }
}

/// Partial override of [`DatabaseConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfigJson {
    pub path: Option<String>,
}

impl DatabaseConfigJson {
    pub fn apply_to(&self, config: &mut DatabaseConfig) {
        if let Some(ref path) = self.path {
            config.path = path.clone();
        }
    }
}

/// Partial override of [`LoggingConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfigJson {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl LoggingConfigJson {
    pub fn apply_to(&self, config: &mut LoggingConfig) {
        if let Some(ref level) = self.level {
            config.level = level.clone();
        }
        if let Some(ref file) = self.file {
            config.file = file.clone();
        }
    }
}
