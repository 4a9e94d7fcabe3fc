//! The open `Configuration` map of the settings document.
//!
//! Known keys get typed accessors. A value of the wrong shape reads back as the
//! key's default instead of failing the whole load, and keys this module does
//! not know about are left alone.

use std::fmt::Display;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::debug;

const DESIRED_TENANT: &str = "DesiredTenant";
const BROWSER_PROFILE: &str = "ChromeProfile";
const SUBSCRIPTION: &str = "Subscription";
const RESOURCE_GROUP: &str = "ResourceGroup";
const CONSOLE_WIDTH: &str = "ConsoleWidth";
const VALIDATION_MODE: &str = "ValidationMode";
pub(crate) const IDENTITY_CACHE: &str = "azure_cache";

pub const DEFAULT_CONSOLE_WIDTH: u16 = 75;
pub const MIN_CONSOLE_WIDTH: u16 = 50;
pub const MAX_CONSOLE_WIDTH: u16 = 200;

/// Which templates get validated before a batch deployment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Validate every enabled template before deploying any.
    #[default]
    All,
    /// Validate only templates that need redeployment.
    Changed,
    /// No validation.
    Skip,
}

impl ValidationMode {
    /// The next mode in the All → Changed → Skip → All cycle.
    pub fn next(self) -> Self {
        match self {
            Self::All => Self::Changed,
            Self::Changed => Self::Skip,
            Self::Skip => Self::All,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::All => "validating all templates",
            Self::Changed => "only validating changed templates",
            Self::Skip => "skipping validation",
        }
    }
}

impl Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Changed => write!(f, "Changed"),
            Self::Skip => write!(f, "Skip"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(Map<String, Value>);

impl Configuration {
    /// Read a key, falling back to `None` when it is missing or malformed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.0.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key, %err, "ignoring malformed configuration value");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        // Serializing plain data into a Value cannot fail; keep the old value if it somehow does.
        if let Ok(value) = serde_json::to_value(value) {
            self.0.insert(key.to_string(), value);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn desired_tenant(&self) -> Option<String> {
        self.get(DESIRED_TENANT)
    }

    pub fn set_desired_tenant(&mut self, tenant_id: &str) {
        self.set(DESIRED_TENANT, tenant_id);
    }

    pub fn clear_desired_tenant(&mut self) {
        self.remove(DESIRED_TENANT);
    }

    pub fn browser_profile(&self) -> Option<String> {
        self.get(BROWSER_PROFILE)
    }

    pub fn set_browser_profile(&mut self, profile: &str) {
        self.set(BROWSER_PROFILE, profile);
    }

    pub fn subscription(&self) -> Option<String> {
        self.get(SUBSCRIPTION)
    }

    pub fn set_subscription(&mut self, subscription_id: &str) {
        self.set(SUBSCRIPTION, subscription_id);
    }

    pub fn resource_group(&self) -> Option<String> {
        self.get::<String>(RESOURCE_GROUP)
            .filter(|group| !group.is_empty())
    }

    pub fn set_resource_group(&mut self, resource_group: &str) {
        self.set(RESOURCE_GROUP, resource_group);
    }

    pub fn console_width(&self) -> u16 {
        self.get::<u16>(CONSOLE_WIDTH)
            .filter(|width| (MIN_CONSOLE_WIDTH..=MAX_CONSOLE_WIDTH).contains(width))
            .unwrap_or(DEFAULT_CONSOLE_WIDTH)
    }

    pub fn set_console_width(&mut self, width: u16) {
        self.set(CONSOLE_WIDTH, width);
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.get(VALIDATION_MODE).unwrap_or_default()
    }

    pub fn set_validation_mode(&mut self, mode: ValidationMode) {
        self.set(VALIDATION_MODE, mode);
    }
}
