use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{Settings, timestamp_now};

pub const SETTINGS_FILE_NAME: &str = ".deployment-settings.json";

/// Backing storage for [`Settings`].
pub trait SettingsStore: Send + Sync {
    /// Load the settings. A missing or unreadable document yields the defaults.
    fn load(&self) -> Settings;

    /// Drop shadowed records, stamp `last_updated` and overwrite the stored document.
    fn save(&self, settings: &mut Settings) -> Result<()>;
}

/// Settings kept as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The settings file of a working directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Settings {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "settings not readable, using defaults");
                return Settings::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "settings file is corrupt, using defaults");
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &mut Settings) -> Result<()> {
        let pruned = settings.prune_shadowed_records();
        if pruned > 0 {
            debug!(pruned, "dropped records shadowed by records with history");
        }
        settings.last_updated = Some(timestamp_now());

        let content =
            serde_json::to_string_pretty(settings).context("serializing deployment settings")?;

        // Write next to the target and rename over it so a crash never leaves half a document.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temporary file in {}", dir.display()))?;
        file.write_all(content.as_bytes())
            .context("writing deployment settings")?;
        file.persist(&self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        debug!(path = %self.path.display(), records = settings.file_order.len(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Outcome, TemplateRecord, ValidationMode};
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path());

        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path());
        fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_unreadable_record_does_not_discard_the_document() {
        let dir = tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path());
        fs::write(
            store.path(),
            r#"{
  "SelectedParameterFile": "parameters.dev.json",
  "FileOrder": [
    { "FileName": "network.bicep", "Enabled": "yes" },
    { "Enabled": true },
    { "FileName": "app.bicep", "Enabled": false, "LastDeploymentSuccess": true }
  ],
  "Configuration": { "ValidationMode": "Skip" }
}"#,
        )
        .unwrap();

        let settings = store.load();
        assert_eq!(settings.selected_parameter_file.as_deref(), Some("parameters.dev.json"));
        assert_eq!(settings.configuration.validation_mode(), ValidationMode::Skip);
        assert_eq!(settings.file_order.len(), 1);
        assert_eq!(settings.file_order[0].file_name, "app.bicep");
        assert!(!settings.file_order[0].enabled);
        assert_eq!(settings.file_order[0].last_deployment_success, Outcome::Succeeded);
    }

    #[test]
    fn test_save_then_load_keeps_order_and_configuration() {
        let dir = tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path());

        let mut deployed = TemplateRecord::new("b.bicep", true);
        deployed.last_deployment_success = Outcome::Failed;
        deployed.last_deployment_error = Some("boom".to_string());

        let mut settings = Settings {
            selected_parameter_file: Some("parameters.local.json".to_string()),
            file_order: vec![
                TemplateRecord::new("c.bicep", true),
                deployed,
                TemplateRecord::new("a.bicep", false),
            ],
            ..Default::default()
        };
        settings.configuration.set_validation_mode(ValidationMode::Skip);
        settings.configuration.set_desired_tenant("contoso.onmicrosoft.com");

        store.save(&mut settings).unwrap();
        let loaded = store.load();

        assert!(loaded.last_updated.is_some());
        assert_eq!(loaded.file_order, settings.file_order);
        assert_eq!(
            loaded.configuration.keys().collect::<Vec<_>>(),
            settings.configuration.keys().collect::<Vec<_>>()
        );
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_reads_document_written_by_previous_versions() {
        let dir = tempdir().unwrap();
        let store = JsonSettingsStore::in_dir(dir.path());
        fs::write(
            store.path(),
            r#"{
  "SelectedParameterFile": null,
  "LastUpdated": "2025-09-05 09:29:07",
  "FileOrder": [
    { "FileName": "main", "Enabled": true, "LastDeploymentSuccess": true,
      "LastDeployment": "2025-09-05 09:29:07", "LastFileHash": null }
  ],
  "Configuration": { "ValidationMode": "Changed" }
}"#,
        )
        .unwrap();

        let settings = store.load();
        assert_eq!(settings.file_order.len(), 1);
        assert_eq!(settings.file_order[0].last_deployment_success, Outcome::Succeeded);
        assert_eq!(settings.file_order[0].last_file_hash, None);
        assert_eq!(settings.configuration.validation_mode(), ValidationMode::Changed);
    }
}
