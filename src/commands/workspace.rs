use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::{
    args::GlobalArgs,
    settings::JsonSettingsStore,
    templates::TemplateRegistry,
};

/// Used when neither the command line nor the configuration names a resource group.
pub const DEFAULT_RESOURCE_GROUP: &str = "MyResourceGroup";

/// The working directory every command operates on.
#[derive(Clone)]
pub struct Workspace {
    registry: TemplateRegistry,
    resource_group: Option<String>,
}

impl Workspace {
    pub fn new(registry: TemplateRegistry, resource_group: Option<String>) -> Self {
        Self {
            registry,
            resource_group,
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// The `--resource-group` flag, else the configured resource group, else the default.
    pub fn resource_group(&self) -> String {
        self.resource_group
            .clone()
            .or_else(|| self.registry.settings().configuration.resource_group())
            .unwrap_or_else(|| DEFAULT_RESOURCE_GROUP.to_string())
    }
}

impl TryFrom<&GlobalArgs> for Workspace {
    type Error = anyhow::Error;

    fn try_from(args: &GlobalArgs) -> Result<Self> {
        let root = args
            .directory
            .canonicalize()
            .with_context(|| format!("opening {}", args.directory.display()))?;
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }

        let store = Arc::new(JsonSettingsStore::in_dir(&root));
        Ok(Self::new(
            TemplateRegistry::new(root, store),
            args.resource_group.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{settings, templates::fixtures::registry_with};

    #[test]
    fn test_resource_group_precedence() {
        let (_dir, registry) = registry_with(&[]);

        let workspace = Workspace::new(registry.clone(), None);
        assert_eq!(workspace.resource_group(), DEFAULT_RESOURCE_GROUP);

        settings::update(registry.store(), |s| {
            s.configuration.set_resource_group("rg-configured")
        })
        .unwrap();
        assert_eq!(workspace.resource_group(), "rg-configured");

        let workspace = Workspace::new(registry, Some("rg-flag".to_string()));
        assert_eq!(workspace.resource_group(), "rg-flag");
    }
}
