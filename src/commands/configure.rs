//! The Azure configuration submenu: tenant, login, subscription, resource group and display settings.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use console::style;
use tracing::{info, warn};

use crate::{
    commands::{Command, validators::ConsoleWidthValidator},
    dependencies::{AccountManager, AzCliError, AzureCli, CliProbe},
    identity::Identity,
    interaction::{
        InputPrompt, InputPromptOptions, InputPromptResult, InputPromptValidator, Interaction,
        SelectPrompt, SelectPromptOptions, SelectPromptResult, SpinnerInteraction, with_progress,
    },
    models::UNKNOWN,
    settings::{self, SettingsStore},
    templates::TemplateRegistry,
};

pub trait ConfigureInteraction: SelectPrompt + InputPrompt + SpinnerInteraction + Send + Sync {}

impl<T> ConfigureInteraction for T where
    T: SelectPrompt + InputPrompt + SpinnerInteraction + Send + Sync + ?Sized
{
}

/// What the configuration menu needs from the Azure CLI.
pub trait AccountTool: CliProbe + AccountManager + Send + Sync {}

impl<T> AccountTool for T where T: CliProbe + AccountManager + Send + Sync + ?Sized {}

const SET_TENANT: &str = "Set Tenant";
const VALIDATE_LOGIN: &str = "Validate Login";
const LOGIN: &str = "Login";
const SET_BROWSER_PROFILE: &str = "Set Browser Profile";
const SUBSCRIPTIONS: &str = "Get Subscriptions";
const RESOURCE_GROUPS: &str = "Get Resource Groups";
const CONSOLE_WIDTH: &str = "Console Width";
const BACK: &str = "Back to Main Menu";

const DEFAULT_BROWSER_PROFILE: &str = "Default";

pub struct Configure {
    store: Arc<dyn SettingsStore>,
    tool: Box<dyn AccountTool>,
    identity: Identity,
    interaction: Box<dyn ConfigureInteraction>,
}

impl Configure {
    pub fn new(registry: &TemplateRegistry) -> Self {
        let store = registry.shared_store();
        Self {
            identity: Identity::new(Box::new(AzureCli::new()), store.clone()),
            store,
            tool: Box::new(AzureCli::new()),
            interaction: Box::new(Interaction::new()),
        }
    }

    async fn show_status(&self) -> Result<()> {
        let configuration = self.store.load().configuration;
        let width = usize::from(configuration.console_width());
        let separator = "=".repeat(width);
        let title = "AZURE CONFIGURATION";

        println!("{separator}");
        println!("{:^width$}", title);
        println!("{separator}");
        println!();
        println!("Current Settings:");
        println!(
            "  Tenant: {}",
            configuration.desired_tenant().as_deref().unwrap_or("Not set")
        );
        println!(
            "  Browser profile: {}",
            configuration
                .browser_profile()
                .as_deref()
                .unwrap_or(DEFAULT_BROWSER_PROFILE)
        );
        println!(
            "  Subscription: {}",
            configuration.subscription().as_deref().unwrap_or("Not set")
        );
        println!(
            "  Resource Group: {}",
            configuration
                .resource_group()
                .as_deref()
                .unwrap_or("Using default")
        );
        println!(
            "  Console Width: {} characters",
            configuration.console_width()
        );
        println!();

        match self.tool.version().await {
            Ok(version) => println!("{} Azure CLI {version} is available", style("✅").green()),
            Err(err) => {
                warn!(%err, "Azure CLI unavailable");
                println!("{} {err}", style("❌").red());
            }
        }

        match self.identity.current_tenant_info().await? {
            Some(info) => {
                println!("🔐 Currently logged in to: {}", info.display_name);
                println!("📊 Active Subscription: {}", info.subscription_name);
            }
            None => {
                println!("🔐 Currently logged in to: {UNKNOWN}");
                println!("📊 Active Subscription: None");
            }
        }
        println!("{separator}");
        Ok(())
    }

    fn input(&self, message: &str, default: Option<String>) -> Result<Option<String>> {
        let options = InputPromptOptions::builder()
            .message(message)
            .default_opt(default)
            .build();
        Ok(match self.interaction.input(options)? {
            InputPromptResult::Input(value) => Some(value.trim().to_string()),
            InputPromptResult::Canceled => None,
        })
    }

    fn set_tenant(&self) -> Result<()> {
        let current = self.store.load().configuration.desired_tenant();
        let Some(tenant) = self.input("Tenant ID or domain (used for login)", current)? else {
            return Ok(());
        };

        settings::update(self.store.as_ref(), |settings| {
            if tenant.is_empty() {
                settings.configuration.clear_desired_tenant();
            } else {
                settings.configuration.set_desired_tenant(&tenant);
            }
        })?;
        info!(tenant = %tenant, "desired tenant updated");
        println!("{}", style("Tenant updated").green());
        Ok(())
    }

    async fn validate_login(&self) -> Result<()> {
        self.identity.invalidate()?;
        let logged_in = with_progress(self.interaction.as_ref(), "Validating Azure login", || {
            self.identity.is_logged_in()
        })
        .await?;
        if !logged_in {
            println!("{} Not logged in to Azure", style("❌").red());
            return Ok(());
        }

        match self.identity.current_tenant_info().await? {
            Some(info) => {
                println!(
                    "{} Successfully logged in to {}",
                    style("✅").green(),
                    info.display_name
                );
                println!("   Tenant ID: {}", info.tenant_id);
                println!("   Subscription: {}", info.subscription_name);
            }
            None => println!(
                "{}",
                style("✅ Logged in but could not get tenant information").yellow()
            ),
        }
        Ok(())
    }

    async fn login(&self) -> Result<()> {
        let tenant = self.store.load().configuration.desired_tenant();
        match self.tool.login(tenant).await {
            Ok(()) => println!("{}", style("Login successful!").green()),
            Err(AzCliError::NotInstalled) => {
                println!("{}", style("Azure CLI is not installed or not available in PATH").red());
                println!("Please install the Azure CLI first and restart your terminal");
            }
            Err(err) => println!("{} {err}", style("Login failed:").red()),
        }
        self.identity.invalidate()
    }

    fn set_browser_profile(&self) -> Result<()> {
        let current = self.store.load().configuration.browser_profile();
        let Some(profile) = self.input(
            "Browser profile name (empty for Default)",
            Some(current.unwrap_or_else(|| DEFAULT_BROWSER_PROFILE.to_string())),
        )?
        else {
            return Ok(());
        };

        let profile = if profile.is_empty() {
            DEFAULT_BROWSER_PROFILE.to_string()
        } else {
            profile
        };
        settings::update(self.store.as_ref(), |settings| {
            settings.configuration.set_browser_profile(&profile)
        })?;
        println!("{}", style(format!("Browser profile set to: {profile}")).green());
        Ok(())
    }

    async fn choose_subscription(&self) -> Result<()> {
        let subscriptions = match with_progress(
            self.interaction.as_ref(),
            "Loading subscriptions",
            || self.tool.list_subscriptions(),
        )
        .await?
        {
            Ok(subscriptions) if !subscriptions.is_empty() => subscriptions,
            Ok(_) => {
                println!("{}", style("No subscriptions found").red());
                return Ok(());
            }
            Err(err) => {
                println!("{} {err}", style("Failed to list subscriptions:").red());
                return Ok(());
            }
        };

        let labels: Vec<String> = subscriptions.iter().map(ToString::to_string).collect();
        let SelectPromptResult::Selected(label) = self.interaction.select(
            SelectPromptOptions::builder()
                .message("Select subscription")
                .options(labels.clone())
                .build(),
        )?
        else {
            return Ok(());
        };
        let Some(subscription) = labels
            .iter()
            .position(|l| *l == label)
            .map(|index| &subscriptions[index])
        else {
            return Ok(());
        };

        match self.tool.set_subscription(&subscription.id).await {
            Ok(()) => {
                settings::update(self.store.as_ref(), |settings| {
                    settings.configuration.set_subscription(&subscription.id)
                })?;
                self.identity.invalidate()?;
                info!(subscription = %subscription.id, "subscription selected");
                println!(
                    "{}",
                    style(format!("Subscription set to: {}", subscription.name)).green()
                );
            }
            Err(err) => println!("{} {err}", style("Failed to set subscription:").red()),
        }
        Ok(())
    }

    async fn choose_resource_group(&self) -> Result<()> {
        let groups = match with_progress(
            self.interaction.as_ref(),
            "Loading resource groups",
            || self.tool.list_resource_groups(),
        )
        .await?
        {
            Ok(groups) if !groups.is_empty() => groups,
            Ok(_) => {
                println!("{}", style("No resource groups found").red());
                return Ok(());
            }
            Err(err) => {
                println!("{} {err}", style("Failed to list resource groups:").red());
                return Ok(());
            }
        };

        let labels: Vec<String> = groups.iter().map(ToString::to_string).collect();
        let SelectPromptResult::Selected(label) = self.interaction.select(
            SelectPromptOptions::builder()
                .message("Select resource group")
                .options(labels.clone())
                .build(),
        )?
        else {
            return Ok(());
        };
        let Some(group) = labels
            .iter()
            .position(|l| *l == label)
            .map(|index| &groups[index])
        else {
            return Ok(());
        };

        settings::update(self.store.as_ref(), |settings| {
            settings.configuration.set_resource_group(&group.name)
        })?;
        info!(resource_group = %group.name, "resource group selected");
        println!(
            "{}",
            style(format!("Resource group set to: {}", group.name)).green()
        );
        Ok(())
    }

    fn set_console_width(&self) -> Result<()> {
        let current = self.store.load().configuration.console_width();
        println!("Common widths: 75 compact, 100 standard, 120 wide, 150 extra wide");

        let options = InputPromptOptions::builder()
            .message(format!("Console width (current: {current})"))
            .help_message("Leave empty to keep the current width".to_string())
            .validator(InputPromptValidator::new(ConsoleWidthValidator))
            .build();
        let InputPromptResult::Input(value) = self.interaction.input(options)? else {
            return Ok(());
        };

        let value = value.trim();
        if value.is_empty() {
            println!("{}", style("No change made").yellow());
            return Ok(());
        }
        let width: u16 = value.parse()?;
        settings::update(self.store.as_ref(), |settings| {
            settings.configuration.set_console_width(width)
        })?;
        println!(
            "{}",
            style(format!("Console width set to {width} characters")).green()
        );
        Ok(())
    }
}

#[async_trait]
impl Command for Configure {
    async fn execute(&mut self) -> Result<()> {
        loop {
            self.show_status().await?;

            let selection = self.interaction.select(
                SelectPromptOptions::builder()
                    .message("Configuration")
                    .options([
                        SET_TENANT,
                        VALIDATE_LOGIN,
                        LOGIN,
                        SET_BROWSER_PROFILE,
                        SUBSCRIPTIONS,
                        RESOURCE_GROUPS,
                        CONSOLE_WIDTH,
                        BACK,
                    ])
                    .build(),
            )?;

            let SelectPromptResult::Selected(choice) = selection else {
                return Ok(());
            };
            match choice.as_str() {
                SET_TENANT => self.set_tenant()?,
                VALIDATE_LOGIN => self.validate_login().await?,
                LOGIN => self.login().await?,
                SET_BROWSER_PROFILE => self.set_browser_profile()?,
                SUBSCRIPTIONS => self.choose_subscription().await?,
                RESOURCE_GROUPS => self.choose_resource_group().await?,
                CONSOLE_WIDTH => self.set_console_width()?,
                _ => return Ok(()),
            }
        }
    }
}
