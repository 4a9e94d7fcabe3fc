//! Persisted deployment state: the ordered template records plus the open
//! configuration map, stored as one JSON document per working directory.
//!
//! The document is re-read at the start of every operation and written back
//! right after every mutation (see [`SettingsStore`]). There is no locking:
//! the tool assumes a single operator.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

mod configuration;
mod record;
mod store;

pub use configuration::{
    Configuration, DEFAULT_CONSOLE_WIDTH, MAX_CONSOLE_WIDTH, MIN_CONSOLE_WIDTH, ValidationMode,
};
pub(crate) use configuration::IDENTITY_CACHE;
pub use record::{Outcome, TemplateRecord, stem};
pub use store::{JsonSettingsStore, SETTINGS_FILE_NAME, SettingsStore};

/// Format of every human-readable timestamp in the settings document.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The current local time in [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp written with [`TIMESTAMP_FORMAT`].
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// Index of the record for `name` within `records`. See [`Settings::find_record`].
pub fn find_record_in(records: &[TemplateRecord], name: &str) -> Option<usize> {
    let mut bare = None;
    for (index, record) in records.iter().enumerate() {
        if !record.matches(name) {
            continue;
        }
        if record.has_history() {
            return Some(index);
        }
        bare = Some(index);
    }
    bare
}

/// Load the settings, apply `mutate` and save the result.
pub fn update<T>(store: &dyn SettingsStore, mutate: impl FnOnce(&mut Settings) -> T) -> Result<T> {
    let mut settings = store.load();
    let value = mutate(&mut settings);
    store.save(&mut settings)?;
    Ok(value)
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub selected_parameter_file: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default, deserialize_with = "record::deserialize_records")]
    pub file_order: Vec<TemplateRecord>,
    #[serde(default)]
    pub configuration: Configuration,
}

impl Settings {
    /// Index of the record for `name`.
    ///
    /// Records match on the full file name or on its stem. A record carrying
    /// deploy/validate history wins over a bare one; among bare records the
    /// last one wins.
    pub fn find_record(&self, name: &str) -> Option<usize> {
        find_record_in(&self.file_order, name)
    }

    pub fn record(&self, name: &str) -> Option<&TemplateRecord> {
        self.find_record(name).map(|index| &self.file_order[index])
    }

    /// Index of the record for `name`, appending a bare enabled record first if there is none.
    pub fn record_index_or_insert(&mut self, name: &str) -> usize {
        match self.find_record(name) {
            Some(index) => index,
            None => {
                self.file_order.push(TemplateRecord::new(name, true));
                self.file_order.len() - 1
            }
        }
    }

    /// Position of the first record matching `name`, used for ordering.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.file_order.iter().position(|record| record.matches(name))
    }

    /// Drop bare records whose identity also has a record with history.
    ///
    /// Returns the number of records removed.
    pub fn prune_shadowed_records(&mut self) -> usize {
        let with_history: HashSet<String> = self
            .file_order
            .iter()
            .filter(|record| record.has_history())
            .map(|record| record.identity().to_string())
            .collect();

        let before = self.file_order.len();
        self.file_order
            .retain(|record| record.has_history() || !with_history.contains(record.identity()));
        before - self.file_order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployed(name: &str) -> TemplateRecord {
        let mut record = TemplateRecord::new(name, true);
        record.last_deployment_success = Outcome::Succeeded;
        record.last_deployment_time = Some("2025-09-05 09:29:07".to_string());
        record
    }

    #[test]
    fn test_find_record_prefers_history() {
        let settings = Settings {
            file_order: vec![
                TemplateRecord::new("app.bicep", false),
                deployed("app"),
                TemplateRecord::new("db.bicep", true),
            ],
            ..Default::default()
        };

        assert_eq!(settings.find_record("app.bicep"), Some(1));
        assert_eq!(settings.find_record("db.bicep"), Some(2));
        assert_eq!(settings.find_record("missing.bicep"), None);
    }

    #[test]
    fn test_find_record_takes_last_bare_match() {
        let settings = Settings {
            file_order: vec![
                TemplateRecord::new("app", true),
                TemplateRecord::new("app.bicep", false),
            ],
            ..Default::default()
        };

        assert_eq!(settings.find_record("app.bicep"), Some(1));
        assert_eq!(settings.position_of("app.bicep"), Some(0));
    }

    #[test]
    fn test_prune_drops_only_shadowed_bare_records() {
        let mut settings = Settings {
            file_order: vec![
                TemplateRecord::new("app.bicep", true),
                deployed("app"),
                TemplateRecord::new("db.bicep", true),
            ],
            ..Default::default()
        };

        assert_eq!(settings.prune_shadowed_records(), 1);
        let names: Vec<_> = settings
            .file_order
            .iter()
            .map(|r| r.file_name.as_str())
            .collect();
        assert_eq!(names, ["app", "db.bicep"]);
    }

    #[test]
    fn test_record_index_or_insert_appends_bare_record() {
        let mut settings = Settings::default();
        let index = settings.record_index_or_insert("new.bicep");

        assert_eq!(index, 0);
        assert_eq!(settings.file_order[0], TemplateRecord::new("new.bicep", true));
        assert_eq!(settings.record_index_or_insert("new.bicep"), 0);
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2025-09-05 09:29:07").is_some());
        assert!(parse_timestamp("2025-09-05T09:29:07").is_none());
        assert!(parse_timestamp(&timestamp_now()).is_some());
    }
}
