//! CLI argument parsing layer.
//!
//! The business logic lives in [`crate::commands`], which receives these parsed arguments.

use clap::{Parser, Subcommand};

mod cli;

pub use cli::{Cli, GlobalArgs};

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive deployment menu. This is the default when no command is given.
    Menu(Menu),
    /// Show every template with its deployment and validation status.
    #[command(alias = "ls")]
    List(List),
    /// Validate all enabled templates without deploying them.
    Validate(Validate),
}

#[derive(Parser, Default)]
pub struct Menu;

#[derive(Parser)]
pub struct List;

// Validation uses the parameter file selected in the menu, if any.
#[derive(Parser)]
pub struct Validate;
