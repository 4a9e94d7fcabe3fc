//! Output formatting for the non-interactive commands (`list`, `validate`).
use std::fmt::Display;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

/// How command output is printed, chosen with `--output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Format {
    /// Human readable tables and summaries.
    Text,
    /// One compact JSON document, for scripts.
    Json,
}

pub trait Formattable {
    fn format(&self, format: Format) -> Result<String>;
}

// Text comes from `Display`, JSON from `Serialize`.
impl<T: Display + Serialize> Formattable for T {
    fn format(&self, format: Format) -> Result<String> {
        match format {
            Format::Text => Ok(self.to_string()),
            Format::Json => serde_json::to_string(self).context("serializing command output"),
        }
    }
}
