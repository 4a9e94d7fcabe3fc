use std::{fmt::Display, path::PathBuf};

use serde::{Deserialize, Serialize};

/// The signed-in account as reported by `az account show`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Subscription id of the active subscription.
    pub id: String,
    /// Name of the active subscription.
    pub name: String,
    pub tenant_id: String,
}

/// Tenant details from `az account tenant show`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub display_name: Option<String>,
    pub default_domain: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub state: String,
    pub tenant_id: String,
}

impl Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) [{}]", self.name, self.id, self.state)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawResourceGroup")]
pub struct ResourceGroup {
    pub name: String,
    pub location: String,
    pub provisioning_state: String,
}

#[derive(Deserialize)]
struct RawResourceGroup {
    name: String,
    location: String,
    #[serde(default)]
    properties: RawResourceGroupProperties,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResourceGroupProperties {
    #[serde(default)]
    provisioning_state: String,
}

impl From<RawResourceGroup> for ResourceGroup {
    fn from(raw: RawResourceGroup) -> Self {
        Self {
            name: raw.name,
            location: raw.location,
            provisioning_state: raw.properties.provisioning_state,
        }
    }
}

impl Display for ResourceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) [{}]",
            self.name, self.location, self.provisioning_state
        )
    }
}

/// Summary of who is logged in where, as cached in the settings document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    pub tenant_id: String,
    pub display_name: String,
    pub default_domain: String,
    pub subscription_id: String,
    pub subscription_name: String,
}

pub const UNKNOWN: &str = "Unknown";

impl TenantInfo {
    pub fn new(account: Account, tenant: Option<Tenant>) -> Self {
        let tenant = tenant.unwrap_or_default();
        Self {
            tenant_id: account.tenant_id,
            display_name: tenant.display_name.unwrap_or_else(|| UNKNOWN.to_string()),
            default_domain: tenant.default_domain.unwrap_or_else(|| UNKNOWN.to_string()),
            subscription_id: account.id,
            subscription_name: account.name,
        }
    }
}

/// How Azure reconciles the resource group with the template.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DeploymentMode {
    /// Only add or update the resources in the template.
    #[default]
    Incremental,
    /// Also delete resources in the resource group that the template does not define.
    Complete,
}

impl Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incremental => write!(f, "Incremental"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// What to validate or deploy, and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub resource_group: String,
    pub template_file: PathBuf,
    pub parameters_file: Option<PathBuf>,
}
