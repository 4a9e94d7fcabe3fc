//! Bicep templates in the working directory and their deployment state.

use std::{fmt::Display, path::PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

mod change;
mod parameters;
mod registry;

pub use change::{ChangeStatus, content_hash, detect, modified_at};
pub use parameters::{LOCAL_PARAMETER_FILE, parameter_files};
pub use registry::TemplateRegistry;

use crate::settings::Outcome;

pub const TEMPLATE_EXTENSION: &str = "bicep";

/// A template file on disk merged with its persisted history.
///
/// Size, modification time and hash are read from disk on every discovery pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size: u64,
    pub enabled: bool,
    #[serde(skip)]
    pub last_modified: Option<NaiveDateTime>,
    pub content_hash: Option<String>,
    pub change: ChangeStatus,

    #[serde(skip)]
    pub last_deployment: Outcome,
    pub last_deployment_error: Option<String>,
    pub last_deployment_time: Option<String>,
    #[serde(skip)]
    pub last_validation: Outcome,
    pub last_validation_error: Option<String>,
    pub last_validation_time: Option<String>,
}

impl Template {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn needs_redeployment(&self) -> bool {
        self.change.needs_redeployment()
    }

    pub fn deployment_status(&self) -> DeploymentStatus {
        if self.is_empty() {
            return DeploymentStatus::Empty;
        }
        match self.last_deployment {
            Outcome::NeverAttempted => DeploymentStatus::NeverDeployed,
            Outcome::Failed => DeploymentStatus::Failed,
            Outcome::Succeeded if self.needs_redeployment() => DeploymentStatus::Changed,
            Outcome::Succeeded => DeploymentStatus::UpToDate,
        }
    }

    pub fn validation_status(&self) -> ValidationStatus {
        if self.is_empty() {
            return ValidationStatus::Empty;
        }
        match self.last_validation {
            Outcome::NeverAttempted => ValidationStatus::NeverValidated,
            Outcome::Failed => ValidationStatus::Failed,
            Outcome::Succeeded => ValidationStatus::Passed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Empty,
    NeverDeployed,
    Failed,
    Changed,
    UpToDate,
}

impl DeploymentStatus {
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Empty => "⚫",
            Self::NeverDeployed => "⚪",
            Self::Failed => "🔴",
            Self::Changed => "🟡",
            Self::UpToDate => "🟢",
        }
    }
}

impl Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::NeverDeployed => write!(f, "Never deployed"),
            Self::Failed => write!(f, "Failed"),
            Self::Changed => write!(f, "Changed"),
            Self::UpToDate => write!(f, "Up to date"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Empty,
    NeverValidated,
    Failed,
    Passed,
}

impl ValidationStatus {
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Empty => "⚫",
            Self::NeverValidated => "⚪",
            Self::Failed => "❌",
            Self::Passed => "✅",
        }
    }
}

impl Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::NeverValidated => write!(f, "Never validated"),
            Self::Failed => write!(f, "Failed"),
            Self::Passed => write!(f, "Passed"),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) use super::registry::tests::registry_with;

    /// A non-empty, enabled template with no history.
    pub fn template(name: &str) -> Template {
        Template {
            name: name.to_string(),
            path: PathBuf::from(name),
            size: 128,
            enabled: true,
            last_modified: None,
            content_hash: None,
            change: ChangeStatus::Untracked,
            last_deployment: Outcome::NeverAttempted,
            last_deployment_error: None,
            last_deployment_time: None,
            last_validation: Outcome::NeverAttempted,
            last_validation_error: None,
            last_validation_time: None,
        }
    }
}
