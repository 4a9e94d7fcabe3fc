//! Validate-then-deploy over the templates of the working directory.
//!
//! One [`BatchRun`] is created for every batch (or single deployment) and carries the
//! per-run state: where the run is, whether validation already happened in bulk, and
//! the operator's sticky choice for unchanged templates. Nothing outlives the run.

use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use anyhow::{Result, bail};
use console::style;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    dependencies::{TemplateDeployer, TemplateValidator},
    interaction::{
        ConfirmationPrompt, ConfirmationPromptOptions, SelectPrompt, SelectPromptOptions,
        SelectPromptResult, SpinnerInteraction, with_progress,
    },
    models::{DeploymentMode, DeploymentRequest},
    settings::{Outcome, ValidationMode},
    table::Table,
    templates::{ChangeStatus, Template, TemplateRegistry},
};

pub trait OrchestratorInteraction:
    ConfirmationPrompt + SelectPrompt + SpinnerInteraction + Send + Sync
{
}

impl<T> OrchestratorInteraction for T where
    T: ConfirmationPrompt + SelectPrompt + SpinnerInteraction + Send + Sync + ?Sized
{
}

/// What the orchestrator needs from the Azure CLI.
pub trait DeploymentTool: TemplateValidator + TemplateDeployer + Send + Sync {}

impl<T> DeploymentTool for T where T: TemplateValidator + TemplateDeployer + Send + Sync + ?Sized {}

const MODE_INCREMENTAL: &str = "Incremental - only deploy changes";
const MODE_COMPLETE: &str = "Complete - remove resources not in template (CAUTION)";
const MODE_QUIT: &str = "Quit - return to main menu";

const UNCHANGED_DEPLOY: &str = "Deploy anyway";
const UNCHANGED_SKIP: &str = "Skip";
const UNCHANGED_ALWAYS_SKIP: &str = "Always skip unchanged templates";
const UNCHANGED_ALWAYS_DEPLOY: &str = "Always deploy unchanged templates";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    NotStarted,
    Validating,
    AwaitingValidationDecision,
    Deploying,
    AwaitingFailureDecision,
    Completed,
    Cancelled,
}

/// How unchanged templates are handled for the rest of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnchangedPolicy {
    #[default]
    Prompt,
    AlwaysSkip,
    AlwaysDeploy,
}

#[derive(Debug)]
pub struct BatchRun {
    state: BatchState,
    validation_mode: ValidationMode,
    bulk_validated: bool,
    unchanged: UnchangedPolicy,
}

impl BatchRun {
    pub fn new(validation_mode: ValidationMode) -> Self {
        Self {
            state: BatchState::NotStarted,
            validation_mode,
            bulk_validated: false,
            unchanged: UnchangedPolicy::Prompt,
        }
    }

    fn transition(&mut self, state: BatchState) {
        debug!(from = ?self.state, to = ?state, "batch state");
        self.state = state;
    }

    fn should_validate(&self, change: ChangeStatus) -> bool {
        if self.bulk_validated {
            return false;
        }
        match self.validation_mode {
            ValidationMode::All => true,
            ValidationMode::Changed => change.needs_redeployment(),
            ValidationMode::Skip => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Deployed,
    /// Unchanged and skipped on the operator's request.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub state: BatchState,
}

impl BatchSummary {
    fn new(succeeded: usize, failed: usize, state: BatchState) -> Self {
        Self {
            succeeded,
            failed,
            state,
        }
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Successful: {}, Failed: {}", self.succeeded, self.failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateValidation {
    pub template: String,
    pub passed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<TemplateValidation>,
}

impl Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.results.is_empty() {
            return write!(f, "No enabled templates found for validation");
        }

        let table = Table::from_iter(
            &self.results,
            &[
                ("TEMPLATE", |r: &TemplateValidation| r.template.clone()),
                ("RESULT", |r: &TemplateValidation| {
                    let result = if r.passed { "passed" } else { "failed" };
                    result.to_string()
                }),
                ("ERROR", |r: &TemplateValidation| {
                    r.error.clone().unwrap_or_default()
                }),
            ],
        );
        write!(f, "{table}{} passed, {} failed", self.passed, self.failed)
    }
}

pub struct Orchestrator<'a, I: ?Sized> {
    registry: &'a TemplateRegistry,
    tool: &'a dyn DeploymentTool,
    interaction: &'a I,
    resource_group: &'a str,
    parameters_file: Option<PathBuf>,
}

impl<'a, I> Orchestrator<'a, I>
where
    I: OrchestratorInteraction + ?Sized,
{
    pub fn new(
        registry: &'a TemplateRegistry,
        tool: &'a dyn DeploymentTool,
        interaction: &'a I,
        resource_group: &'a str,
    ) -> Self {
        Self {
            registry,
            tool,
            interaction,
            resource_group,
            parameters_file: registry.selected_parameter_file(),
        }
    }

    fn request(&self, template: &Template) -> DeploymentRequest {
        DeploymentRequest {
            resource_group: self.resource_group.to_string(),
            template_file: template.path.clone(),
            parameters_file: self.parameters_file.clone(),
        }
    }

    fn validation_mode(&self) -> ValidationMode {
        self.registry.settings().configuration.validation_mode()
    }

    fn confirm(&self, options: ConfirmationPromptOptions) -> Result<bool> {
        Ok(self.interaction.confirm(options)?.is_yes())
    }

    fn report_failure(&self, name: &str, message: &str) {
        error!(template = name, "{message}");
        println!("  {} {}", style("❌").red(), style(message).red());
    }

    /// Validate every enabled, non-empty template. Deployment state is left alone.
    pub async fn validate_all(&self) -> Result<ValidationSummary> {
        let templates = self.registry.discover()?;
        let enabled: Vec<&Template> = templates
            .iter()
            .filter(|t| t.enabled && !t.is_empty())
            .collect();

        if enabled.is_empty() {
            warn!("no enabled templates found for validation");
            return Ok(ValidationSummary::default());
        }
        self.validate_templates(&enabled).await
    }

    async fn validate_templates(&self, templates: &[&Template]) -> Result<ValidationSummary> {
        info!(
            count = templates.len(),
            resource_group = self.resource_group,
            parameters = ?self.parameters_file,
            "bulk validation"
        );

        let mut summary = ValidationSummary::default();
        for (position, template) in templates.iter().enumerate() {
            println!(
                "{} Validating template {}/{}: {}",
                style("▶").cyan(),
                position + 1,
                templates.len(),
                style(&template.name).cyan()
            );

            let result = self.validate_one(template).await;
            if result.passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(result);
        }

        info!(passed = summary.passed, failed = summary.failed, "validation finished");
        Ok(summary)
    }

    /// Validate one template and record the outcome.
    ///
    /// Never fails: anything unexpected is recorded as a validation failure so the
    /// rest of the batch still gets validated.
    async fn validate_one(&self, template: &Template) -> TemplateValidation {
        let name = template.name.as_str();
        let error = match self.try_validate_one(template).await {
            Ok(error) => error,
            Err(err) => {
                let message = format!("Unexpected error during validation: {err:#}");
                self.report_failure(name, &message);
                if let Err(err) = self.registry.record_validation(name, false, Some(&message)) {
                    error!(template = name, %err, "failed to record validation");
                }
                Some(message)
            }
        };

        TemplateValidation {
            template: name.to_string(),
            passed: error.is_none(),
            error,
        }
    }

    /// `Ok(None)` when the template passed, `Ok(Some(error))` when the CLI rejected it.
    async fn try_validate_one(&self, template: &Template) -> Result<Option<String>> {
        let name = template.name.as_str();
        let request = self.request(template);
        let result = with_progress(
            self.interaction,
            format!("Validating {name}"),
            || self.tool.validate(&request),
        )
        .await?;

        match result {
            Ok(()) => {
                info!(template = name, "validation passed");
                println!("  {} {name} validation successful", style("✅").green());
                self.registry.record_validation(name, true, None)?;
                Ok(None)
            }
            Err(err) => {
                let message = err.to_string();
                self.report_failure(name, &format!("{name} validation failed: {message}"));
                self.registry.record_validation(name, false, Some(&message))?;
                Ok(Some(message))
            }
        }
    }

    /// Deploy every enabled template in order.
    ///
    /// Unchanged templates skipped on request count as successes; templates the
    /// operator declines after an earlier failure are not counted at all.
    pub async fn deploy_all(&self) -> Result<BatchSummary> {
        let templates = self.registry.discover()?;
        let enabled: Vec<&Template> = templates.iter().filter(|t| t.enabled).collect();
        let mut run = BatchRun::new(self.validation_mode());

        if enabled.is_empty() {
            println!("{}", style("No enabled templates found for deployment").yellow());
            run.transition(BatchState::Completed);
            return Ok(BatchSummary::new(0, 0, run.state));
        }

        if !self.validate_before_deploying(&enabled, &mut run).await? {
            return Ok(BatchSummary::new(0, 0, run.state));
        }

        let Some(mode) = self.choose_mode()? else {
            println!("{}", style("Deployment cancelled").yellow());
            run.transition(BatchState::Cancelled);
            return Ok(BatchSummary::new(0, 0, run.state));
        };

        println!(
            "🚀 Deploying templates as {}, {}.",
            style(mode).cyan(),
            style(run.validation_mode.description()).yellow()
        );
        info!(%mode, validation = %run.validation_mode, count = enabled.len(), "batch deployment");
        run.transition(BatchState::Deploying);

        let (mut succeeded, mut failed) = (0, 0);
        for (position, template) in enabled.iter().enumerate() {
            println!(
                "{} Template {}/{}: {}",
                style("▶").cyan(),
                position + 1,
                enabled.len(),
                style(&template.name).cyan()
            );

            if !self.confirm_previous_failure(template)? {
                println!("{}", style(format!("Skipped {} (user choice)", template.name)).yellow());
                continue;
            }

            // Complete mode is only ever applied to the first template of a batch.
            let template_mode = if position == 0 {
                mode
            } else {
                DeploymentMode::Incremental
            };
            if template_mode != mode {
                println!(
                    "{}",
                    style("Using Incremental mode (Complete mode only applies to the first template)")
                        .yellow()
                );
            }

            match self.deploy_one(template, template_mode, &mut run).await {
                DeployOutcome::Deployed | DeployOutcome::Skipped => succeeded += 1,
                DeployOutcome::Failed(_) => {
                    failed += 1;
                    run.transition(BatchState::AwaitingFailureDecision);
                    let keep_going = self.confirm(
                        ConfirmationPromptOptions::builder()
                            .message("Continue with remaining templates?")
                            .default(true)
                            .build(),
                    )?;
                    if !keep_going {
                        println!("{}", style("Batch deployment cancelled").yellow());
                        run.transition(BatchState::Cancelled);
                        break;
                    }
                    run.transition(BatchState::Deploying);
                }
            }
        }

        if run.state != BatchState::Cancelled {
            run.transition(BatchState::Completed);
        }

        let summary = BatchSummary::new(succeeded, failed, run.state);
        info!(succeeded, failed, state = ?run.state, "batch deployment finished");
        println!("{}", style("=== DEPLOYMENT SUMMARY ===").cyan());
        println!("{summary}");
        Ok(summary)
    }

    /// Bulk validation ahead of a batch. Returns `false` when the batch must stop.
    async fn validate_before_deploying(
        &self,
        enabled: &[&Template],
        run: &mut BatchRun,
    ) -> Result<bool> {
        let candidates: Vec<&Template> = match run.validation_mode {
            ValidationMode::All => enabled.iter().copied().filter(|t| !t.is_empty()).collect(),
            ValidationMode::Changed => enabled
                .iter()
                .copied()
                .filter(|t| !t.is_empty() && t.needs_redeployment())
                .collect(),
            ValidationMode::Skip => {
                println!("{}", style("Skipping validation (Validation Mode: Skip)").yellow());
                return Ok(true);
            }
        };

        if candidates.is_empty() {
            println!(
                "{}",
                style("No changed templates found, proceeding with deployment").yellow()
            );
            return Ok(true);
        }

        run.transition(BatchState::Validating);
        let summary = self.validate_templates(&candidates).await?;
        run.bulk_validated = true;

        if summary.failed == 0 {
            println!(
                "{} All {} templates passed validation",
                style("✅").green(),
                summary.passed
            );
            return Ok(true);
        }

        run.transition(BatchState::AwaitingValidationDecision);
        let proceed = self.confirm(
            ConfirmationPromptOptions::builder()
                .message("Continue with deployment anyway?")
                .default(false)
                .pre_confirmation_help_text(format!(
                    "⚠️  {} template(s) failed validation!",
                    summary.failed
                ))
                .build(),
        )?;

        if !proceed {
            println!("{}", style("Deployment cancelled due to validation failures").yellow());
            run.transition(BatchState::Cancelled);
        }
        Ok(proceed)
    }

    /// Incremental, Complete (after a second confirmation) or `None` to quit.
    fn choose_mode(&self) -> Result<Option<DeploymentMode>> {
        loop {
            let selection = self.interaction.select(
                SelectPromptOptions::builder()
                    .message("Choose deployment mode")
                    .options([MODE_INCREMENTAL, MODE_COMPLETE, MODE_QUIT])
                    .build(),
            )?;

            match selection {
                SelectPromptResult::Selected(value) if value == MODE_INCREMENTAL => {
                    return Ok(Some(DeploymentMode::Incremental));
                }
                SelectPromptResult::Selected(value) if value == MODE_COMPLETE => {
                    let confirmed = self.confirm(
                        ConfirmationPromptOptions::builder()
                            .message("Are you sure?")
                            .default(false)
                            .pre_confirmation_help_text(format!(
                                "WARNING: Complete mode will remove resources in '{}' that are not defined in the template!",
                                self.resource_group
                            ))
                            .build(),
                    )?;
                    if confirmed {
                        return Ok(Some(DeploymentMode::Complete));
                    }
                    println!("{}", style("Cancelled Complete mode selection").yellow());
                }
                _ => return Ok(None),
            }
        }
    }

    /// Shows the previous deployment error and asks whether to go ahead.
    ///
    /// Templates whose last deployment did not fail pass without a prompt.
    fn confirm_previous_failure(&self, template: &Template) -> Result<bool> {
        if template.last_deployment != Outcome::Failed {
            return Ok(true);
        }

        let error = template.last_deployment_error.as_deref().unwrap_or("unknown error");
        let rule = "=".repeat(80);
        self.confirm(
            ConfirmationPromptOptions::builder()
                .message("Do you want to continue with deployment?")
                .default(true)
                .pre_confirmation_help_text(format!(
                    "{}\n{}\n{}\n{}",
                    style("WARNING: Previous deployment failed with error:").red(),
                    style(&rule).red(),
                    style(error).yellow(),
                    style(&rule).red()
                ))
                .build(),
        )
    }

    /// Deploy one template picked from the menu.
    ///
    /// Returns `None` when the template cannot be deployed or the operator backs out.
    pub async fn deploy_single(
        &self,
        templates: &[Template],
        position: usize,
    ) -> Result<Option<DeployOutcome>> {
        let Some(template) = templates.get(position) else {
            bail!("there is no template #{}", position + 1);
        };

        if template.is_empty() {
            println!(
                "{}",
                style(format!("Cannot deploy empty template file: {}", template.name)).red()
            );
            return Ok(None);
        }
        if !template.enabled {
            println!(
                "{}",
                style(format!("Template {} is disabled", template.name)).yellow()
            );
            return Ok(None);
        }
        if !self.confirm_previous_failure(template)? {
            return Ok(None);
        }

        let mode = if position == 0 {
            match self.choose_mode()? {
                Some(mode) => mode,
                None => return Ok(None),
            }
        } else {
            DeploymentMode::Incremental
        };

        let mut run = BatchRun::new(self.validation_mode());
        run.transition(BatchState::Deploying);
        let outcome = self.deploy_one(template, mode, &mut run).await;
        run.transition(BatchState::Completed);
        Ok(Some(outcome))
    }

    /// Validate (as the run's policy dictates) and deploy one template.
    ///
    /// Never fails: anything unexpected is recorded against the template and
    /// returned as [`DeployOutcome::Failed`].
    pub async fn deploy_one(
        &self,
        template: &Template,
        mode: DeploymentMode,
        run: &mut BatchRun,
    ) -> DeployOutcome {
        match self.try_deploy_one(template, mode, run).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let message = format!("Unexpected error during deployment: {err:#}");
                self.report_failure(&template.name, &message);
                if let Err(err) =
                    self.registry
                        .record_deployment(&template.name, false, Some(&message))
                {
                    error!(template = %template.name, %err, "failed to record deployment");
                }
                DeployOutcome::Failed(message)
            }
        }
    }

    async fn try_deploy_one(
        &self,
        template: &Template,
        mode: DeploymentMode,
        run: &mut BatchRun,
    ) -> Result<DeployOutcome> {
        let name = template.name.as_str();

        if template.is_empty() {
            let message = format!("Cannot deploy empty template file: {name}");
            self.report_failure(name, &message);
            self.registry.record_deployment(name, false, Some(&message))?;
            return Ok(DeployOutcome::Failed(message));
        }

        // A record without any deployment outcome is treated like an unchanged one.
        let change = self.registry.change_status(name);
        if !change.needs_redeployment() && !self.deploy_unchanged(name, run)? {
            println!("  {} Skipped {name} (unchanged)", style("⏭️").yellow());
            return Ok(DeployOutcome::Skipped);
        }

        let request = self.request(template);

        if run.should_validate(change) {
            let validation = with_progress(
                self.interaction,
                format!("Validating {name}"),
                || self.tool.validate(&request),
            )
            .await?;

            if let Err(err) = validation {
                let message = format!("Template validation failed: {err}");
                self.report_failure(name, &message);
                self.registry
                    .record_validation(name, false, Some(&err.to_string()))?;
                self.registry.record_deployment(name, false, Some(&message))?;
                return Ok(DeployOutcome::Failed(message));
            }
            self.registry.record_validation(name, true, None)?;
        }

        let deployment = with_progress(
            self.interaction,
            format!("Deploying {name}"),
            || self.tool.deploy(&request, mode),
        )
        .await?;

        match deployment {
            Ok(deployment_name) => {
                info!(template = name, deployment = %deployment_name, %mode, "deployed");
                println!("  {} Successfully deployed {name}", style("✅").green());
                self.registry.record_deployment(name, true, None)?;
                Ok(DeployOutcome::Deployed)
            }
            Err(err) => {
                let message = format!("Deployment failed: {err}");
                self.report_failure(name, &message);
                self.registry.record_deployment(name, false, Some(&message))?;
                Ok(DeployOutcome::Failed(message))
            }
        }
    }

    /// Whether an unchanged template is deployed anyway; may make the choice sticky for the run.
    fn deploy_unchanged(&self, name: &str, run: &mut BatchRun) -> Result<bool> {
        match run.unchanged {
            UnchangedPolicy::AlwaysSkip => return Ok(false),
            UnchangedPolicy::AlwaysDeploy => return Ok(true),
            UnchangedPolicy::Prompt => {}
        }

        let selection = self.interaction.select(
            SelectPromptOptions::builder()
                .message(format!(
                    "Template '{name}' has not changed since last deployment. Deploy anyway?"
                ))
                .options([
                    UNCHANGED_DEPLOY,
                    UNCHANGED_SKIP,
                    UNCHANGED_ALWAYS_SKIP,
                    UNCHANGED_ALWAYS_DEPLOY,
                ])
                .build(),
        )?;

        Ok(match selection {
            SelectPromptResult::Selected(value) if value == UNCHANGED_DEPLOY => true,
            SelectPromptResult::Selected(value) if value == UNCHANGED_ALWAYS_SKIP => {
                run.unchanged = UnchangedPolicy::AlwaysSkip;
                false
            }
            SelectPromptResult::Selected(value) if value == UNCHANGED_ALWAYS_DEPLOY => {
                run.unchanged = UnchangedPolicy::AlwaysDeploy;
                true
            }
            _ => false,
        })
    }
}
