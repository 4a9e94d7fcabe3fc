//! This module contains business logic for the commands for the application.
//!
//! The main entry point is the [`command_from_args`] function which converts CLI arguments into a command.
use anyhow::Result;

use crate::{args::Commands, formatting::Format};
pub use configure::Configure;
pub use core::{Command, CommandWithOutput, CommandWithOutputExt};
pub use workspace::Workspace;

pub mod configure;
mod core;
pub mod list;
pub mod menu;
pub mod orchestrator;
pub mod validate;
mod validators;
mod workspace;

/// Convert CLI arguments into a command.
///
/// Without a subcommand the interactive menu runs. Output of the non-interactive
/// commands is printed to stdout in the format chosen with `--output`.
pub fn command_from_args(
    command: Option<Commands>,
    workspace: &Workspace,
    format: Format,
) -> Result<Box<dyn Command>> {
    match command.unwrap_or(Commands::Menu(Default::default())) {
        Commands::Menu(_) => Ok(Box::new(menu::Menu::from(workspace))),
        Commands::List(_) => list::List::from(workspace).with_print_to_stdout(format),
        Commands::Validate(_) => validate::Validate::from(workspace).with_print_to_stdout(format),
    }
}
