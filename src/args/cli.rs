//! Root command for the CLI.
use std::path::PathBuf;

use clap::{Args, Parser};

use crate::formatting::Format;

use super::Commands;

/// Validate and deploy the Bicep templates of a directory with the Azure CLI
#[derive(Parser)]
#[command(name = "bicep-deploy", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global_args: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Enable debug logging.
    ///
    /// Sets the log level to debug and echoes the logs to the console.
    /// The level can also be set with the `BICEP_DEPLOY_LOG` environment variable;
    /// when `BICEP_DEPLOY_LOG_ALL` is set, logs from all crates are shown.
    #[arg(global = true, hide = true, long, short = 'D', default_value = "false")]
    pub debug: bool,

    /// Output format.
    #[arg(global = true, long = "output", short = 'o')]
    pub format: Option<Format>,

    /// Azure resource group to deploy to; overrides the resource group chosen in the configuration menu.
    ///
    /// `MyResourceGroup` is used when neither this flag nor the configuration names one.
    #[arg(global = true, long, short = 'r')]
    pub resource_group: Option<String>,

    /// Directory containing the templates and the settings file.
    #[arg(global = true, long, short = 'C', default_value = ".")]
    pub directory: PathBuf,
}

impl GlobalArgs {
    pub fn format(&self) -> Format {
        self.format.unwrap_or(Format::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resource_group_help_states_precedence() {
        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "resource_group")
            .and_then(|arg| arg.get_help())
            .unwrap()
            .to_string();
        assert!(help.contains("overrides the resource group chosen in the configuration menu"));
    }

    #[test]
    fn test_menu_is_the_default() {
        let cli = Cli::try_parse_from(["bicep-deploy", "-r", "rg-test"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.global_args.resource_group.as_deref(), Some("rg-test"));
        assert_eq!(cli.global_args.directory, PathBuf::from("."));
        assert_eq!(cli.global_args.format(), Format::Text);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["bicep-deploy", "ls", "-o", "json", "-C", "infra"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List(_))));
        assert_eq!(cli.global_args.format(), Format::Json);
        assert_eq!(cli.global_args.directory, PathBuf::from("infra"));
    }
}
