//! This module defines traits for external dependencies (the Azure CLI) to make them
//! easy to mock and substitute in tests. Commands receive boxed trait objects and never
//! spawn processes themselves.
pub mod azure_cli;

pub use azure_cli::*;
