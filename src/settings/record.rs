//! Per-template history records as they are persisted in the settings document.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

/// Outcome of the most recent validate or deploy attempt.
///
/// Persisted as a nullable boolean so that settings written by older versions
/// of the tool keep loading: absent/`null` is [`Outcome::NeverAttempted`],
/// `false` is [`Outcome::Failed`] and `true` is [`Outcome::Succeeded`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    #[default]
    NeverAttempted,
    Failed,
    Succeeded,
}

impl Outcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Succeeded
        } else {
            Self::Failed
        }
    }

    pub fn is_never_attempted(&self) -> bool {
        matches!(self, Self::NeverAttempted)
    }

    fn as_option(&self) -> Option<bool> {
        match self {
            Self::NeverAttempted => None,
            Self::Failed => Some(false),
            Self::Succeeded => Some(true),
        }
    }
}

impl From<Option<bool>> for Outcome {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Self::NeverAttempted,
            Some(success) => Self::from_success(success),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_option().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<bool>::deserialize(deserializer)?.into())
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of the persisted `FileOrder` list.
///
/// The position of the record in the list drives both the display order and
/// the deployment order. Keys the tool does not know about are kept in
/// [`TemplateRecord::extra`] and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateRecord {
    pub file_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Outcome::is_never_attempted")]
    pub last_deployment_success: Outcome,
    #[serde(
        rename = "LastDeployment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_deployment_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deployment_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_file_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Outcome::is_never_attempted")]
    pub last_validation_success: Outcome,
    #[serde(
        rename = "LastValidation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_validation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validation_error: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TemplateRecord {
    /// A bare record: a name and the enabled flag, no history.
    pub fn new(file_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            file_name: file_name.into(),
            enabled,
            last_deployment_success: Outcome::NeverAttempted,
            last_deployment_time: None,
            last_deployment_error: None,
            last_file_hash: None,
            last_validation_success: Outcome::NeverAttempted,
            last_validation_time: None,
            last_validation_error: None,
            extra: Map::new(),
        }
    }

    /// Whether any deploy or validate outcome (or time) has been recorded.
    ///
    /// A history key stored as `null` does not count: it reads as
    /// [`Outcome::NeverAttempted`] and is not written back, so the record is bare.
    pub fn has_history(&self) -> bool {
        !self.last_deployment_success.is_never_attempted()
            || !self.last_validation_success.is_never_attempted()
            || self.last_deployment_time.is_some()
            || self.last_validation_time.is_some()
    }

    /// Whether this record belongs to `name`, matching the full file name or its stem.
    pub fn matches(&self, name: &str) -> bool {
        self.file_name == name || self.file_name == stem(name)
    }

    /// The logical identity of the record: its file name without extension.
    pub fn identity(&self) -> &str {
        stem(&self.file_name)
    }
}

/// Deserialize `FileOrder` one entry at a time, dropping the entries that are not
/// valid records instead of rejecting the whole document.
pub(super) fn deserialize_records<'de, D>(deserializer: D) -> Result<Vec<TemplateRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(position, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(position, %err, "dropping unreadable template record");
                None
            }
        })
        .collect())
}

/// File name without its extension; the name itself if there is none.
pub fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
}
