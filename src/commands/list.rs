//! Command to list the templates of the working directory with their status.

use std::fmt::Display;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::{
    commands::{CommandWithOutput, Workspace},
    table::Table,
    templates::{ChangeStatus, DeploymentStatus, Template, TemplateRegistry, ValidationStatus},
};

pub struct List {
    registry: TemplateRegistry,
}

impl From<&Workspace> for List {
    fn from(workspace: &Workspace) -> Self {
        List {
            registry: workspace.registry().clone(),
        }
    }
}

/// One row of the list output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemplateStatus {
    pub position: usize,
    pub name: String,
    pub enabled: bool,
    pub size: u64,
    pub change: ChangeStatus,
    pub deployment: DeploymentStatus,
    pub validation: ValidationStatus,
    pub last_deployment_time: Option<String>,
    pub last_deployment_error: Option<String>,
    pub last_validation_time: Option<String>,
    pub last_validation_error: Option<String>,
}

impl TemplateStatus {
    fn new(position: usize, template: Template) -> Self {
        Self {
            position,
            deployment: template.deployment_status(),
            validation: template.validation_status(),
            name: template.name,
            enabled: template.enabled,
            size: template.size,
            change: template.change,
            last_deployment_time: template.last_deployment_time,
            last_deployment_error: template.last_deployment_error,
            last_validation_time: template.last_validation_time,
            last_validation_error: template.last_validation_error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListResult(Vec<TemplateStatus>);

impl From<&ListResult> for Table {
    fn from(value: &ListResult) -> Self {
        Table::from_iter(
            &value.0,
            &[
                ("#", |t| t.position.to_string()),
                ("NAME", |t| t.name.clone()),
                ("ENABLED", |t| String::from(if t.enabled { "yes" } else { "no" })),
                ("DEPLOYMENT", |t| {
                    format!("{} {}", t.deployment.indicator(), t.deployment)
                }),
                ("VALIDATION", |t| {
                    format!("{} {}", t.validation.indicator(), t.validation)
                }),
                ("LAST DEPLOYED", |t| {
                    t.last_deployment_time.clone().unwrap_or_else(|| "-".to_string())
                }),
            ],
        )
    }
}

impl Display for ListResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No templates found");
        }
        Table::from(self).fmt(f)
    }
}

#[async_trait]
impl CommandWithOutput for List {
    type Output = ListResult;

    async fn execute(&mut self) -> Result<Self::Output> {
        Ok(ListResult(
            self.registry
                .discover()?
                .into_iter()
                .enumerate()
                .map(|(index, template)| TemplateStatus::new(index + 1, template))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::fixtures::registry_with;

    #[tokio::test]
    async fn test_list_command() {
        let (_dir, registry) = registry_with(&[("app.bicep", "app"), ("empty.bicep", "")]);
        registry
            .record_deployment("app.bicep", false, Some("Deployment failed: boom"))
            .unwrap();

        let mut list = List { registry };
        let result = list.execute().await.unwrap();

        let ListResult(rows) = &result;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "app.bicep");
        assert_eq!(rows[0].deployment, DeploymentStatus::Failed);
        assert_eq!(
            rows[0].last_deployment_error.as_deref(),
            Some("Deployment failed: boom")
        );
        assert_eq!(rows[1].name, "empty.bicep");
        assert!(!rows[1].enabled);
        assert_eq!(rows[1].deployment, DeploymentStatus::Empty);
        assert_eq!(rows[1].validation, ValidationStatus::Empty);

        let text = result.to_string();
        assert!(text.starts_with("#  NAME"));
        assert!(text.contains("🔴 Failed"));
    }

    #[tokio::test]
    async fn test_list_without_templates() {
        let (_dir, registry) = registry_with(&[]);
        let result = List { registry }.execute().await.unwrap();
        assert_eq!(result.to_string(), "No templates found");
    }
}
