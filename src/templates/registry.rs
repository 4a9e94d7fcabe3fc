use std::{
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{
    ChangeStatus, TEMPLATE_EXTENSION, Template,
    change::{content_hash, detect, modified_at},
};
use crate::settings::{
    self, Outcome, Settings, SettingsStore, TemplateRecord, find_record_in, timestamp_now,
};

/// Template files of one working directory, merged with their persisted records.
///
/// Every operation loads the settings fresh and saves right after mutating them.
#[derive(Clone)]
pub struct TemplateRegistry {
    root: PathBuf,
    store: Arc<dyn SettingsStore>,
}

impl TemplateRegistry {
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn SettingsStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn shared_store(&self) -> Arc<dyn SettingsStore> {
        self.store.clone()
    }

    pub fn settings(&self) -> Settings {
        self.store.load()
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Names of the template files in the working directory, unordered.
    fn template_file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in
            fs::read_dir(&self.root).with_context(|| format!("reading {}", self.root.display()))?
        {
            let entry = entry.context("reading directory entry")?;
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXTENSION)
            {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// All template files merged with their records, in persisted order.
    ///
    /// Files without a record sort after the ones with a record; ties sort by name.
    pub fn discover(&self) -> Result<Vec<Template>> {
        let settings = self.store.load();

        let mut templates = self
            .template_file_names()?
            .into_iter()
            .map(|name| self.inspect(&settings, name))
            .collect::<Vec<_>>();

        let unlisted = settings.file_order.len();
        let position = |t: &Template| settings.position_of(&t.name).unwrap_or(unlisted);
        templates.sort_by(|a, b| match position(a).cmp(&position(b)) {
            Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        });

        debug!(count = templates.len(), "discovered templates");
        Ok(templates)
    }

    fn inspect(&self, settings: &Settings, name: String) -> Template {
        let path = self.path_of(&name);
        let record = settings.record(&name);

        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or_default();
        let last_modified = modified_at(&path);
        let content_hash = content_hash(&path);
        let change = detect(record, content_hash.as_deref(), last_modified);

        // Empty files can never be enabled, whatever the record says.
        let enabled = size > 0 && record.is_none_or(|r| r.enabled);

        Template {
            name,
            path,
            size,
            enabled,
            last_modified,
            content_hash,
            change,
            last_deployment: record.map(|r| r.last_deployment_success).unwrap_or_default(),
            last_deployment_error: record.and_then(|r| r.last_deployment_error.clone()),
            last_deployment_time: record.and_then(|r| r.last_deployment_time.clone()),
            last_validation: record.map(|r| r.last_validation_success).unwrap_or_default(),
            last_validation_error: record.and_then(|r| r.last_validation_error.clone()),
            last_validation_time: record.and_then(|r| r.last_validation_time.clone()),
        }
    }

    /// Fresh change detection for a single template.
    pub fn change_status(&self, name: &str) -> ChangeStatus {
        let settings = self.store.load();
        let path = self.path_of(name);
        detect(
            settings.record(name),
            content_hash(&path).as_deref(),
            modified_at(&path),
        )
    }

    /// Enable or disable a template.
    ///
    /// Returns `false`, without saving anything, when asked to enable an empty file.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let path = self.path_of(name);
        let is_empty = fs::metadata(&path).is_ok_and(|m| m.len() == 0);
        if enabled && is_empty {
            warn!(template = name, "cannot enable empty file");
            return Ok(false);
        }

        settings::update(self.store(), |settings| match settings.find_record(name) {
            Some(index) => settings.file_order[index].enabled = enabled,
            None => settings
                .file_order
                .push(TemplateRecord::new(name, enabled)),
        })?;

        debug!(template = name, enabled, "template toggled");
        Ok(true)
    }

    /// Put the named templates first, in the given order.
    ///
    /// Records not named keep their relative order after the named ones; names
    /// without a record get a fresh one.
    pub fn reorder<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        settings::update(self.store(), |settings| {
            let mut remaining = std::mem::take(&mut settings.file_order);
            let mut reordered = Vec::with_capacity(remaining.len() + names.len());

            for name in names.iter().map(|name| name.as_ref()) {
                if reordered.iter().any(|r: &TemplateRecord| r.file_name == name) {
                    continue;
                }
                match find_record_in(&remaining, name) {
                    Some(index) => reordered.push(remaining.remove(index)),
                    None => reordered.push(TemplateRecord::new(name, true)),
                }
            }

            reordered.extend(remaining);
            settings.file_order = reordered;
        })?;

        info!(count = names.len(), "template order updated");
        Ok(())
    }

    /// Record the outcome of a deployment attempt together with the current content hash.
    ///
    /// The stored error is replaced by `error` on failure and cleared on success.
    pub fn record_deployment(&self, name: &str, success: bool, error: Option<&str>) -> Result<()> {
        let hash = content_hash(&self.path_of(name));

        settings::update(self.store(), |settings| {
            let index = settings.record_index_or_insert(name);
            let record = &mut settings.file_order[index];
            record.last_deployment_success = Outcome::from_success(success);
            record.last_deployment_time = Some(timestamp_now());
            record.last_file_hash = hash;
            record.last_deployment_error = error.filter(|_| !success).map(str::to_string);
        })?;

        debug!(template = name, success, "deployment recorded");
        Ok(())
    }

    /// Record the outcome of a validation attempt. Deployment fields are left alone.
    pub fn record_validation(&self, name: &str, success: bool, error: Option<&str>) -> Result<()> {
        settings::update(self.store(), |settings| {
            let index = settings.record_index_or_insert(name);
            let record = &mut settings.file_order[index];
            record.last_validation_success = Outcome::from_success(success);
            record.last_validation_time = Some(timestamp_now());
            record.last_validation_error = error.filter(|_| !success).map(str::to_string);
        })?;

        debug!(template = name, success, "validation recorded");
        Ok(())
    }

    /// Add bare records for template files that have none. Returns how many were added.
    pub fn sync_new_files(&self) -> Result<usize> {
        let mut names = self.template_file_names()?;
        names.sort();

        let mut settings = self.store.load();
        let mut added = 0;
        for name in names {
            if settings.find_record(&name).is_none() {
                settings.file_order.push(TemplateRecord::new(name, true));
                added += 1;
            }
        }

        if added > 0 {
            self.store.save(&mut settings)?;
            info!(added, "discovered new templates");
        }
        Ok(added)
    }

    /// The stored parameter file, if one is selected and still exists.
    pub fn selected_parameter_file(&self) -> Option<PathBuf> {
        let selected = self.store.load().selected_parameter_file?;
        let path = self.root.join(selected);
        path.is_file().then_some(path)
    }

    pub fn select_parameter_file(&self, path: Option<&Path>) -> Result<()> {
        let stored = path.map(|path| {
            path.strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned()
        });
        settings::update(self.store(), |settings| {
            settings.selected_parameter_file = stored;
        })
    }
}
