//! Harness configuration.
//!
//! Defaults are built in code (with `ONELOGIN_*` environment variables),
//! then an optional JSON document is merged over them. Known groups merge
//! key by key; unknown groups are kept as-is and stay reachable through
//! dotted-path lookup.

pub mod sections;

pub use sections::{
    ApplicationConfig, DatabaseConfig, LoggingConfig, OneLoginConfig, SamlSettings,
    DEMO_CLIENT_ID, DEMO_CLIENT_SECRET, DEMO_SUBDOMAIN,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};
use sections::{DatabaseConfigJson, LoggingConfigJson, OneLoginConfigJson, SamlSettingsJson};

/// Override file name looked up under `<base_dir>/config`.
pub const DEFAULT_CONFIG_FILE: &str = "saml_settings.json";

/// Complete harness configuration. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub onelogin: OneLoginConfig,
    pub saml: SamlSettings,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub applications: BTreeMap<String, ApplicationConfig>,

    /// Top-level groups from the override file that the harness doesn't know.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Root for the config, logs and data directories.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_onelogin(PathBuf::from("."), OneLoginConfig::default())
    }
}

/// Result of [`Settings::validate_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigValidation {
    pub onelogin_configured: bool,
    pub saml_configured: bool,
    pub applications_configured: bool,
    pub directories_exist: bool,
    pub all_configured: bool,
}

impl Settings {
    /// Defaults rooted at `base_dir`, with credentials from the environment.
    pub fn from_env(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_onelogin(base_dir.into(), OneLoginConfig::from_env())
    }

    fn with_onelogin(base_dir: PathBuf, onelogin: OneLoginConfig) -> Self {
        let mut applications = BTreeMap::new();
        applications.insert(
            "app1".to_string(),
            ApplicationConfig::new("HR Management System", "https://hr.example.com"),
        );
        applications.insert(
            "app2".to_string(),
            ApplicationConfig::new("Payroll System", "https://payroll.example.com"),
        );
        applications.insert(
            "app3".to_string(),
            ApplicationConfig::new("Employee Portal", "https://portal.example.com"),
        );

        Self {
            onelogin,
            saml: SamlSettings::default(),
            database: DatabaseConfig {
                path: base_dir.join("data").join("users.db").display().to_string(),
            },
            logging: LoggingConfig {
                file: base_dir
                    .join("logs")
                    .join("sso_integration.log")
                    .display()
                    .to_string(),
                ..Default::default()
            },
            applications,
            extra: Map::new(),
            base_dir,
        }
    }

    /// Load settings rooted at `base_dir`.
    ///
    /// Reads `override_path` if given, otherwise `<base_dir>/config/saml_settings.json`.
    /// A missing file means defaults; an unreadable one is logged and ignored.
    pub fn load(base_dir: impl Into<PathBuf>, override_path: Option<&Path>) -> Self {
        let mut settings = Self::from_env(base_dir);
        let path = override_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| settings.config_dir().join(DEFAULT_CONFIG_FILE));

        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return settings;
        }

        match settings.merge_file(&path) {
            Ok(()) => info!(path = %path.display(), "Configuration loaded"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not load config file"),
        }
        settings
    }

    /// Merge a JSON override file into these settings.
    pub fn merge_file(&mut self, path: &Path) -> HarnessResult<()> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.display(), e)))?;
        self.merge_json(value)
    }

    /// Merge a JSON override document into these settings.
    ///
    /// The merge is all-or-nothing: a malformed known group leaves `self` untouched.
    pub fn merge_json(&mut self, value: Value) -> HarnessResult<()> {
        let Value::Object(groups) = value else {
            return Err(HarnessError::Config(
                "configuration root must be a JSON object".to_string(),
            ));
        };

        let mut merged = self.clone();
        for (key, group) in groups {
            match key.as_str() {
                "onelogin" if group.is_object() => {
                    parse_group::<OneLoginConfigJson>(&key, group)?.apply_to(&mut merged.onelogin);
                }
                "saml" if group.is_object() => {
                    parse_group::<SamlSettingsJson>(&key, group)?.apply_to(&mut merged.saml);
                }
                "database" if group.is_object() => {
                    parse_group::<DatabaseConfigJson>(&key, group)?.apply_to(&mut merged.database);
                }
                "logging" if group.is_object() => {
                    parse_group::<LoggingConfigJson>(&key, group)?.apply_to(&mut merged.logging);
                }
                "applications" if group.is_object() => {
                    let apps = parse_group::<BTreeMap<String, ApplicationConfig>>(&key, group)?;
                    merged.applications.extend(apps);
                }
                "onelogin" | "saml" | "database" | "logging" | "applications" => {
                    return Err(HarnessError::Config(format!(
                        "'{}' must be a JSON object",
                        key
                    )));
                }
                _ => {
                    merged.extra.insert(key, group);
                }
            }
        }

        *self = merged;
        Ok(())
    }

    /// Look up a value by dotted path, e.g. `"saml.acs_url"` or `"applications.app1.name"`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    /// Dotted-path lookup returning a string value.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Applications with `enabled: true`, ordered by key.
    pub fn enabled_applications(&self) -> Vec<(&str, &ApplicationConfig)> {
        self.applications
            .iter()
            .filter(|(_, app)| app.enabled)
            .map(|(key, app)| (key.as_str(), app))
            .collect()
    }

    /// True when client id, client secret and subdomain are all set.
    pub fn is_configured(&self) -> bool {
        !self.onelogin.client_id.is_empty()
            && !self.onelogin.client_secret.is_empty()
            && !self.onelogin.subdomain.is_empty()
    }

    /// Per-area configuration status.
    pub fn validate_config(&self) -> ConfigValidation {
        let onelogin_configured =
            !self.onelogin.client_id.is_empty() && !self.onelogin.client_secret.is_empty();
        let saml_configured = !self.saml.entity_id.is_empty();
        let applications_configured = !self.enabled_applications().is_empty();
        let directories_exist = self.config_dir().exists() && self.logs_dir().exists();

        ConfigValidation {
            onelogin_configured,
            saml_configured,
            applications_configured,
            directories_exist,
            all_configured: onelogin_configured
                && saml_configured
                && applications_configured
                && directories_exist,
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Create the config and logs directories if missing.
    pub fn ensure_directories(&self) -> HarnessResult<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

fn parse_group<T: serde::de::DeserializeOwned>(key: &str, group: Value) -> HarnessResult<T> {
    serde_json::from_value(group)
        .map_err(|e| HarnessError::Config(format!("invalid '{}' group: {}", key, e)))
}
