//! The interactive main loop.
//!
//! Every pass re-discovers the templates, redraws the screen and reads one choice.
//! Handlers never end the loop: their errors become the notice shown on the next
//! redraw. Only `Q` (or cancelling the prompt) quits.

use std::{fs, str::FromStr};

use anyhow::Result;
use async_trait::async_trait;
use console::{Alignment, Term, measure_text_width, pad_str, style};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    commands::{
        Command, Configure, Workspace,
        orchestrator::{
            BatchState, BatchSummary, DeployOutcome, DeploymentTool, Orchestrator,
            OrchestratorInteraction,
        },
        validators::{TemplateOrderValidator, parse_order},
    },
    dependencies::AzureCli,
    identity::Identity,
    interaction::{
        InputPrompt, InputPromptOptions, InputPromptResult, InputPromptValidator, Interaction,
        MultiSelectPrompt, MultiSelectPromptOptions, MultiSelectPromptResult, SelectPrompt,
        SelectPromptOptions, SelectPromptResult,
    },
    settings::{self, ValidationMode},
    table::truncate,
    templates::{Template, parameter_files},
};

pub trait MenuInteraction: OrchestratorInteraction + InputPrompt + MultiSelectPrompt {}

impl<T> MenuInteraction for T where T: OrchestratorInteraction + InputPrompt + MultiSelectPrompt + ?Sized {}

const TITLE: &str = "BICEP TEMPLATE DEPLOYMENT";
const NO_PARAMETER_FILE: &str = "None (no parameter file)";

/// Templates beyond this count are laid out in columns.
const SINGLE_COLUMN_LIMIT: usize = 20;
const COLUMN_GAP: &str = "     ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// 1-based template number as shown on screen.
    Deploy(usize),
    DeployAll,
    ToggleValidation,
    Reorder,
    Parameters,
    Refresh,
    Configure,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid choice '{0}'. Please try again.")]
pub struct InvalidChoice(String);

impl FromStr for MenuChoice {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let choice = s.trim();
        if let Ok(number) = choice.parse::<usize>() {
            return Ok(Self::Deploy(number));
        }

        match choice.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::DeployAll),
            "V" => Ok(Self::ToggleValidation),
            "O" => Ok(Self::Reorder),
            "P" => Ok(Self::Parameters),
            "R" => Ok(Self::Refresh),
            "C" => Ok(Self::Configure),
            "Q" => Ok(Self::Quit),
            _ => Err(InvalidChoice(choice.to_string())),
        }
    }
}

/// Result of the last deployment, shown in the header until the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LastResult {
    success: bool,
    message: String,
}

impl LastResult {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<&BatchSummary> for LastResult {
    fn from(summary: &BatchSummary) -> Self {
        match summary {
            BatchSummary {
                state: BatchState::Cancelled,
                succeeded: 0,
                failed: 0,
            } => Self::failure("Deployment cancelled"),
            BatchSummary {
                succeeded,
                failed: 0,
                ..
            } => Self::success(format!(
                "All templates deployed successfully ({succeeded} templates)"
            )),
            BatchSummary {
                succeeded, failed, ..
            } => Self::failure(format!("{failed} template(s) failed, {succeeded} succeeded")),
        }
    }
}

pub struct Menu {
    workspace: Workspace,
    tool: Box<dyn DeploymentTool>,
    identity: Identity,
    configure: Box<dyn Command + Send>,
    interaction: Box<dyn MenuInteraction>,
    last_result: Option<LastResult>,
    notice: Option<String>,
}

impl From<&Workspace> for Menu {
    fn from(workspace: &Workspace) -> Self {
        let registry = workspace.registry();
        Menu {
            workspace: workspace.clone(),
            tool: Box::new(AzureCli::new()),
            identity: Identity::new(Box::new(AzureCli::new()), registry.shared_store()),
            configure: Box::new(Configure::new(registry)),
            interaction: Box::new(Interaction::new()),
            last_result: None,
            notice: None,
        }
    }
}

impl Menu {
    fn render(&self, templates: &[Template]) {
        let configuration = self.workspace.registry().settings().configuration;
        let width = usize::from(configuration.console_width());
        let separator = "=".repeat(width);

        if let Err(err) = Term::stdout().clear_screen() {
            debug!(%err, "could not clear the screen");
        }

        println!("{separator}");
        println!("{:^width$}", TITLE);
        println!("{separator}");
        println!();
        println!("📁 Resource Group: {}", self.workspace.resource_group());
        match self.workspace.registry().selected_parameter_file() {
            Some(path) => println!(
                "⚙️  Parameter File: {}",
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            ),
            None => println!("⚙️  Parameter File: None selected"),
        }
        println!("🔧 Azure: Use 'C' to configure and check status");
        if let Some(last) = &self.last_result {
            let mark = if last.success { "✅" } else { "❌" };
            println!("{mark} Last Result: {}", last.message);
        }

        println!();
        println!("📋 Available Templates ({} found):", templates.len());
        if templates.is_empty() {
            println!("  No templates found");
        }
        for line in template_lines(templates, configuration.console_width()) {
            println!("{line}");
        }

        let enabled = templates.iter().filter(|t| t.enabled).count();
        println!();
        println!(
            "📊 Status: {enabled} enabled, {} disabled",
            templates.len() - enabled
        );

        if !templates.is_empty() {
            println!();
            println!("🔘 Legend: ✅=Enabled ❌=Disabled");
            println!("   Deploy: 🟢=Up to date 🟡=Changed 🔴=Failed ⚪=Never deployed ⚫=Empty");
            println!("   Validate: ✅=Passed ❌=Failed ⚪=Never validated ⚫=Empty");
        }

        println!();
        println!("{separator}");
        let options = menu_options(templates.len(), configuration.validation_mode());
        for line in wrap_options(&options, configuration.console_width()) {
            println!("{line}");
        }
        println!("{separator}");

        if let Some(notice) = &self.notice {
            println!("{notice}");
        }
    }

    async fn warn_if_logged_out(&mut self) {
        if !self.identity.is_logged_in().await {
            warn!("not logged in to Azure");
            self.notice = Some(
                style("Not logged in to Azure. Please use 'C' option to configure Azure access.")
                    .yellow()
                    .to_string(),
            );
        }
    }

    async fn handle(&mut self, choice: MenuChoice, templates: &[Template]) -> Result<()> {
        match choice {
            MenuChoice::Deploy(number) => self.deploy_single(templates, number).await,
            MenuChoice::DeployAll => self.deploy_all().await,
            MenuChoice::ToggleValidation => self.toggle_validation_mode(),
            MenuChoice::Reorder => self.reorder(templates),
            MenuChoice::Parameters => self.choose_parameter_file(),
            MenuChoice::Refresh => self.refresh(),
            MenuChoice::Configure => self.configure.execute().await,
            MenuChoice::Quit => Ok(()),
        }
    }

    async fn deploy_all(&mut self) -> Result<()> {
        let resource_group = self.workspace.resource_group();
        let summary = Orchestrator::new(
            self.workspace.registry(),
            self.tool.as_ref(),
            self.interaction.as_ref(),
            &resource_group,
        )
        .deploy_all()
        .await?;

        self.last_result = Some(LastResult::from(&summary));
        Ok(())
    }

    async fn deploy_single(&mut self, templates: &[Template], number: usize) -> Result<()> {
        if number == 0 || number > templates.len() {
            self.notice = Some(style("Invalid template number").red().to_string());
            return Ok(());
        }

        let template = &templates[number - 1];
        if template.is_empty() {
            self.notice = Some(
                style(format!(
                    "Template '{}' is empty and cannot be deployed.",
                    template.name
                ))
                .red()
                .to_string(),
            );
            return Ok(());
        }
        if !template.enabled {
            self.notice = Some(
                style(format!(
                    "Template '{}' is disabled. Enable it first in reorder mode (O).",
                    template.name
                ))
                .red()
                .to_string(),
            );
            return Ok(());
        }

        let resource_group = self.workspace.resource_group();
        let outcome = Orchestrator::new(
            self.workspace.registry(),
            self.tool.as_ref(),
            self.interaction.as_ref(),
            &resource_group,
        )
        .deploy_single(templates, number - 1)
        .await?;

        let name = &template.name;
        if let Some(outcome) = outcome {
            self.last_result = Some(match outcome {
                DeployOutcome::Deployed => LastResult::success(format!("{name} deployed successfully")),
                DeployOutcome::Skipped => LastResult::success(format!("{name} skipped (unchanged)")),
                DeployOutcome::Failed(_) => LastResult::failure(format!("{name} deployment failed")),
            });
        }
        Ok(())
    }

    fn toggle_validation_mode(&mut self) -> Result<()> {
        let mode = settings::update(self.workspace.registry().store(), |settings| {
            let mode = settings.configuration.validation_mode().next();
            settings.configuration.set_validation_mode(mode);
            mode
        })?;

        info!(%mode, "validation mode changed");
        self.notice = Some(
            style(format!("Validation mode changed to: {mode}"))
                .cyan()
                .to_string(),
        );
        Ok(())
    }

    /// Enable/disable with a checklist, then an optional new order typed as template numbers.
    fn reorder(&mut self, templates: &[Template]) -> Result<()> {
        if templates.is_empty() {
            self.notice = Some(
                style("No templates available for reordering")
                    .yellow()
                    .to_string(),
            );
            return Ok(());
        }

        let registry = self.workspace.registry();
        let labels = templates.iter().map(|t| {
            if t.is_empty() {
                format!("{} (empty)", t.name)
            } else {
                t.name.clone()
            }
        });
        let checked = templates
            .iter()
            .enumerate()
            .filter(|(_, t)| t.enabled)
            .map(|(index, _)| index)
            .collect();

        let MultiSelectPromptResult::Selected(selected) = self.interaction.multi_select(
            MultiSelectPromptOptions::builder()
                .message("Enabled templates")
                .options(labels)
                .checked(checked)
                .build(),
        )?
        else {
            return Ok(());
        };

        let mut rejected = Vec::new();
        for (index, template) in templates.iter().enumerate() {
            let enabled = selected.contains(&index);
            if enabled != template.enabled && !registry.set_enabled(&template.name, enabled)? {
                rejected.push(template.name.as_str());
            }
        }

        let order = self.interaction.input(
            InputPromptOptions::builder()
                .message("New order as template numbers (empty keeps the current order)")
                .help_message("e.g. 3 1 2; templates not listed keep their relative order".to_string())
                .validator(InputPromptValidator::new(TemplateOrderValidator::new(
                    templates.len(),
                )))
                .build(),
        )?;
        if let InputPromptResult::Input(order) = order {
            let positions = parse_order(&order, templates.len()).map_err(anyhow::Error::msg)?;
            if !positions.is_empty() {
                let names: Vec<&str> = positions
                    .iter()
                    .map(|&position| templates[position].name.as_str())
                    .collect();
                registry.reorder(&names)?;
            }
        }

        self.notice = Some(if rejected.is_empty() {
            style("Template settings saved").green().to_string()
        } else {
            style(format!(
                "Empty templates cannot be enabled: {}",
                rejected.join(", ")
            ))
            .yellow()
            .to_string()
        });
        Ok(())
    }

    fn choose_parameter_file(&mut self) -> Result<()> {
        let registry = self.workspace.registry();
        let files = parameter_files(registry.root())?;
        if files.is_empty() {
            self.notice = Some(style("No parameter files found").yellow().to_string());
            return Ok(());
        }

        let mut labels: Vec<String> = files
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let size_kb = fs::metadata(path).map(|m| m.len() / 1024).unwrap_or_default();
                format!("{name} ({size_kb} KB)")
            })
            .collect();
        labels.push(NO_PARAMETER_FILE.to_string());

        let current = registry.selected_parameter_file();
        let starting_cursor = current
            .and_then(|current| files.iter().position(|path| *path == current))
            .unwrap_or(files.len());

        let SelectPromptResult::Selected(label) = self.interaction.select(
            SelectPromptOptions::builder()
                .message("Select parameter file")
                .options(labels.clone())
                .starting_cursor(starting_cursor)
                .build(),
        )?
        else {
            return Ok(());
        };

        let selected = labels
            .iter()
            .position(|l| *l == label)
            .and_then(|index| files.get(index));
        registry.select_parameter_file(selected.map(|path| path.as_path()))?;

        self.notice = Some(match selected {
            Some(path) => style(format!("Selected parameter file: {}", path.display()))
                .green()
                .to_string(),
            None => style("No parameter file selected").yellow().to_string(),
        });
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        let registry = self.workspace.registry();
        registry.sync_new_files()?;
        let count = registry.discover()?.len();
        self.notice = Some(
            style(format!("File list refreshed. Found {count} template(s)."))
                .green()
                .to_string(),
        );
        Ok(())
    }
}

#[async_trait]
impl Command for Menu {
    async fn execute(&mut self) -> Result<()> {
        info!(resource_group = %self.workspace.resource_group(), "deployment session started");
        self.warn_if_logged_out().await;

        loop {
            let templates = match self.workspace.registry().discover() {
                Ok(templates) => templates,
                Err(err) => {
                    error!(error = %format!("{err:#}"), "template discovery failed");
                    self.notice = Some(style(format!("{err:#}")).red().to_string());
                    Vec::new()
                }
            };
            self.render(&templates);
            self.notice = None;

            let input = self.interaction.input(
                InputPromptOptions::builder()
                    .message("Enter your choice:")
                    .build(),
            )?;
            let InputPromptResult::Input(input) = input else {
                info!("session interrupted");
                return Ok(());
            };

            let choice = match input.parse::<MenuChoice>() {
                Ok(choice) => choice,
                Err(err) => {
                    self.notice = Some(style(err.to_string()).red().to_string());
                    continue;
                }
            };
            if choice == MenuChoice::Quit {
                info!("Goodbye!");
                println!("{}", style("Goodbye!").green());
                return Ok(());
            }

            debug!(?choice, "menu choice");
            if let Err(err) = self.handle(choice, &templates).await {
                error!(error = %format!("{err:#}"), "menu action failed");
                self.notice = Some(format!("{} {err:#}", style("Unexpected error:").red()));
            }
        }
    }
}

fn validation_option(mode: ValidationMode) -> String {
    match mode {
        ValidationMode::All => style("[V]alidate All").green().to_string(),
        ValidationMode::Changed => style("[V]alidate Changed").yellow().to_string(),
        ValidationMode::Skip => style("Skip [V]alidation").red().to_string(),
    }
}

fn menu_options(template_count: usize, mode: ValidationMode) -> Vec<String> {
    let mut options = Vec::new();
    if template_count > 0 {
        options.push(format!("1-{template_count} Deploy template"));
    }
    options.push(format!("[A] Deploy all ({})", validation_option(mode)));
    options.extend(
        ["[O] Reorder", "[P] Parameters", "[R] Refresh", "[C] Config", "[Q] Quit"]
            .map(String::from),
    );
    options
}

/// Join options with ` | `, breaking lines so none exceeds the console width minus a margin.
fn wrap_options(options: &[String], console_width: u16) -> Vec<String> {
    let max_width = usize::from(console_width).saturating_sub(4);
    let separator = style(" | ").dim().to_string();

    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_width = 0;
    for option in options {
        let width = measure_text_width(option);
        if !line.is_empty() && line_width + 3 + width > max_width {
            lines.push(std::mem::take(&mut line));
            line_width = 0;
        }
        if !line.is_empty() {
            line.push_str(&separator);
            line_width += 3;
        }
        line.push_str(option);
        line_width += width;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn template_entry(number: usize, template: &Template) -> String {
    let enabled = if template.enabled { "✅" } else { "❌" };
    let name = if template.is_empty() {
        style(&template.name).yellow().to_string()
    } else {
        template.name.clone()
    };
    format!(
        "{number:2}. {enabled}{}{} {name}",
        template.deployment_status().indicator(),
        template.validation_status().indicator()
    )
}

/// Widths of the first and the following columns for a console width.
fn column_widths(console_width: u16) -> (usize, usize) {
    match console_width {
        100.. => (48, 40),
        85..=99 => (40, 35),
        _ => (35, 30),
    }
}

/// One line per template, or several columns read top to bottom once the list gets long.
fn template_lines(templates: &[Template], console_width: u16) -> Vec<String> {
    if templates.len() <= SINGLE_COLUMN_LIMIT {
        return templates
            .iter()
            .enumerate()
            .map(|(index, template)| format!("  {}", template_entry(index + 1, template)))
            .collect();
    }

    let columns = match templates.len() {
        ..=40 => 2,
        41..=60 => 3,
        _ => 4,
    };
    let rows = templates.len().div_ceil(columns);
    let (first_width, other_width) = column_widths(console_width);

    (0..rows)
        .map(|row| {
            let cells: Vec<String> = (0..columns)
                .map(|column| {
                    let index = column * rows + row;
                    let (entry, width) = match (column, templates.get(index)) {
                        (0, Some(template)) => {
                            (format!("  {}", template_entry(index + 1, template)), first_width)
                        }
                        (0, None) => (String::new(), first_width),
                        (_, Some(template)) => (template_entry(index + 1, template), other_width),
                        (_, None) => (String::new(), other_width),
                    };
                    pad_str(&truncate(&entry, width), width, Alignment::Left, None).into_owned()
                })
                .collect();
            cells.join(COLUMN_GAP).trim_end().to_string()
        })
        .collect()
}
