//! Command to validate every enabled template without deploying anything.

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    commands::{
        CommandWithOutput, Workspace,
        orchestrator::{DeploymentTool, Orchestrator, OrchestratorInteraction, ValidationSummary},
    },
    dependencies::AzureCli,
    interaction::Interaction,
};

pub struct Validate {
    workspace: Workspace,
    tool: Box<dyn DeploymentTool>,
    interaction: Box<dyn OrchestratorInteraction>,
}

impl From<&Workspace> for Validate {
    fn from(workspace: &Workspace) -> Self {
        Validate {
            workspace: workspace.clone(),
            tool: Box::new(AzureCli::new()),
            interaction: Box::new(Interaction::new()),
        }
    }
}

#[async_trait]
impl CommandWithOutput for Validate {
    type Output = ValidationSummary;

    async fn execute(&mut self) -> Result<Self::Output> {
        let resource_group = self.workspace.resource_group();
        Orchestrator::new(
            self.workspace.registry(),
            self.tool.as_ref(),
            self.interaction.as_ref(),
            &resource_group,
        )
        .validate_all()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dependencies::mocks::MockAzureCli,
        interaction::mocks::{MockInteraction, spinner_handle},
        models::DeploymentRequest,
        templates::fixtures::registry_with,
    };

    #[tokio::test]
    async fn test_validate_uses_selected_parameter_file() {
        let (dir, registry) = registry_with(&[
            ("main.bicep", "resource x"),
            ("parameters.dev.json", "{}"),
        ]);
        registry
            .select_parameter_file(Some(&dir.path().join("parameters.dev.json")))
            .unwrap();

        let mut interaction = MockInteraction::new();
        interaction
            .expect_start_spinner()
            .withf(|message| message == "Validating main.bicep")
            .return_once(|_| Ok(spinner_handle()));

        let expected_parameters = dir.path().join("parameters.dev.json");
        let mut tool = MockAzureCli::new();
        tool.expect_validate()
            .withf(move |request: &DeploymentRequest| {
                request.resource_group == "rg-dev"
                    && request.parameters_file.as_ref() == Some(&expected_parameters)
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut validate = Validate {
            workspace: Workspace::new(registry, Some("rg-dev".to_string())),
            tool: Box::new(tool),
            interaction: Box::new(interaction),
        };

        let summary = validate.execute().await.unwrap();
        assert_eq!((summary.passed, summary.failed), (1, 0));
        assert_eq!(summary.results[0].template, "main.bicep");
    }
}
