use anyhow::Result;
use clap::Parser;
use console::style;

use crate::{
    args::{Cli, Commands},
    commands::{Workspace, command_from_args},
    logging::{DeploymentLog, setup_logging},
};

mod args;
mod commands;
mod dependencies;
mod formatting;
mod identity;
mod interaction;
mod logging;
mod models;
mod settings;
mod table;
mod templates;

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        global_args,
        command,
    } = Cli::parse();

    let workspace = Workspace::try_from(&global_args)?;

    // Only the interactive session keeps a deployment log.
    let deployment_log = match &command {
        None | Some(Commands::Menu(_)) => {
            match DeploymentLog::create(workspace.registry().root(), &workspace.resource_group()) {
                Ok(log) => {
                    println!("Logging to {}", log.path().display());
                    Some(log)
                }
                Err(err) => {
                    eprintln!(
                        "{} {err:#}",
                        style("Could not create the deployment log, continuing without it:")
                            .yellow()
                    );
                    None
                }
            }
        }
        Some(_) => None,
    };
    setup_logging(global_args.debug, deployment_log);

    let mut command = command_from_args(command, &workspace, global_args.format())?;
    command.execute().await
}
