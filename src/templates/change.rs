//! Change detection: decides whether a template differs from what was last deployed.

use std::{fs, path::Path};

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::settings::{Outcome, TemplateRecord, parse_timestamp};

/// Where a template stands relative to its last deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// There is no record for the template at all.
    Untracked,
    /// The last deployment failed; failed deployments are always retried.
    PreviousFailure,
    /// A record exists but no deployment outcome has been recorded yet.
    NeverDeployed,
    /// Content (or, without hashes, the modification time) moved past the last deployment.
    Changed,
    Unchanged,
}

impl ChangeStatus {
    pub fn needs_redeployment(self) -> bool {
        match self {
            Self::Untracked | Self::PreviousFailure | Self::Changed => true,
            Self::NeverDeployed | Self::Unchanged => false,
        }
    }
}

/// SHA-256 of the file contents as lowercase hex, `None` if the file cannot be read.
pub fn content_hash(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(content) => {
            let mut hasher = Sha256::new();
            hasher.update(&content);
            Some(format!("{:x}", hasher.finalize()))
        }
        Err(err) => {
            trace!(path = %path.display(), %err, "cannot hash file");
            None
        }
    }
}

/// Local modification time of the file, `None` if it cannot be read.
pub fn modified_at(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).naive_local())
}

/// Classify a template against its record.
///
/// The rules apply in order: no record, failed last deployment, no deployment
/// outcome, hash comparison when both hashes exist, then modification time
/// against the recorded deployment time. An unparsable or missing time counts
/// as changed.
pub fn detect(
    record: Option<&TemplateRecord>,
    current_hash: Option<&str>,
    modified: Option<NaiveDateTime>,
) -> ChangeStatus {
    let Some(record) = record else {
        return ChangeStatus::Untracked;
    };

    match record.last_deployment_success {
        Outcome::Failed => return ChangeStatus::PreviousFailure,
        Outcome::NeverAttempted => return ChangeStatus::NeverDeployed,
        Outcome::Succeeded => {}
    }

    if let (Some(current), Some(last)) = (current_hash, record.last_file_hash.as_deref()) {
        return if current == last {
            ChangeStatus::Unchanged
        } else {
            ChangeStatus::Changed
        };
    }

    let deployed_at = record.last_deployment_time.as_deref().and_then(parse_timestamp);
    match (deployed_at, modified) {
        (Some(deployed_at), Some(modified)) if modified <= deployed_at => ChangeStatus::Unchanged,
        _ => ChangeStatus::Changed,
    }
}
