//! The Azure CLI (`az`), driven as a subprocess.
//!
//! Every call requests JSON output where `az` supports it. Validation is time boxed;
//! login and deployment are not.

use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Output, Stdio},
    sync::{LazyLock, OnceLock},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use semver::Version;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{
    models::{Account, DeploymentMode, DeploymentRequest, ResourceGroup, Subscription, Tenant},
    settings::stem,
};

pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(not(target_os = "windows"))]
const AZ_CANDIDATES: &[&str] = &["az", "az.cmd", "az.exe"];

#[cfg(target_os = "windows")]
const AZ_CANDIDATES: &[&str] = &["az.cmd", "az.exe", "az"];

#[derive(Debug, Error)]
pub enum AzCliError {
    #[error("Azure CLI is not installed or not in PATH")]
    NotInstalled,
    #[error("failed to run the Azure CLI: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("{operation} timed out after {} seconds", .timeout.as_secs())]
    TimedOut {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("{0}")]
    CommandFailed(String),
    #[error("unexpected output from the Azure CLI: {0}")]
    InvalidOutput(#[from] serde_json::Error),
    #[error("unable to determine the Azure CLI version: {0}")]
    InvalidVersion(String),
}

#[async_trait]
pub trait CliProbe {
    /// Version of the installed Azure CLI.
    async fn version(&self) -> Result<Version, AzCliError>;
}

#[async_trait]
pub trait AccountReader {
    /// The signed-in account; fails when nobody is logged in.
    async fn show_account(&self) -> Result<Account, AzCliError>;
    async fn show_tenant(&self, tenant_id: &str) -> Result<Tenant, AzCliError>;
}

#[async_trait]
pub trait AccountManager {
    /// Interactive login; the CLI talks to the terminal directly.
    async fn login(&self, tenant_id: Option<String>) -> Result<(), AzCliError>;
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, AzCliError>;
    async fn set_subscription(&self, subscription_id: &str) -> Result<(), AzCliError>;
    /// Resource groups of the active subscription, sorted by name.
    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>, AzCliError>;
}

#[async_trait]
pub trait TemplateValidator {
    async fn validate(&self, request: &DeploymentRequest) -> Result<(), AzCliError>;
}

#[async_trait]
pub trait TemplateDeployer {
    /// Deploy the template, returning the name of the Azure deployment.
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        mode: DeploymentMode,
    ) -> Result<String, AzCliError>;
}

/// The installed Azure CLI.
#[derive(Debug, Default)]
pub struct AzureCli {
    bin: OnceLock<Option<PathBuf>>,
}

impl AzureCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the `az` executable, looked up once.
    fn bin(&self) -> Result<&Path, AzCliError> {
        self.bin
            .get_or_init(|| {
                let found = AZ_CANDIDATES
                    .iter()
                    .find_map(|candidate| which::which(candidate).ok());
                debug!(bin = ?found, "Azure CLI lookup");
                found
            })
            .as_deref()
            .ok_or(AzCliError::NotInstalled)
    }

    fn command<I, S>(&self, args: I) -> Result<Command, AzCliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        trace!(?args, "running az");

        let mut command = Command::new(self.bin()?);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    async fn output<I, S>(&self, args: I) -> Result<Output, AzCliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.command(args)?
            .output()
            .await
            .map_err(AzCliError::Spawn)
    }

    /// Run `az` and parse its stdout, failing with the stderr text on a non-zero exit.
    async fn json<T, I, S>(&self, args: I) -> Result<T, AzCliError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(AzCliError::CommandFailed(failure_text(
                &output,
                "Azure CLI command failed",
            )));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

fn failure_text(output: &Output, fallback: &str) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        fallback.to_string()
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl CliProbe for AzureCli {
    async fn version(&self) -> Result<Version, AzCliError> {
        let versions: HashMap<String, serde_json::Value> =
            self.json(["version", "--output", "json"]).await?;

        let raw = versions
            .get("azure-cli")
            .and_then(|value| value.as_str())
            .ok_or_else(|| AzCliError::InvalidVersion("missing azure-cli entry".to_string()))?;
        Version::parse(raw).map_err(|err| AzCliError::InvalidVersion(format!("{raw}: {err}")))
    }
}

#[async_trait]
impl AccountReader for AzureCli {
    async fn show_account(&self) -> Result<Account, AzCliError> {
        self.json(["account", "show", "--output", "json"]).await
    }

    async fn show_tenant(&self, tenant_id: &str) -> Result<Tenant, AzCliError> {
        self.json([
            "account",
            "tenant",
            "show",
            "--tenant-id",
            tenant_id,
            "--output",
            "json",
        ])
        .await
    }
}

#[async_trait]
impl AccountManager for AzureCli {
    async fn login(&self, tenant_id: Option<String>) -> Result<(), AzCliError> {
        let mut command = Command::new(self.bin()?);
        command.arg("login");
        if let Some(tenant_id) = tenant_id {
            command.arg("--tenant").arg(tenant_id);
        }
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let status = command.status().await.map_err(AzCliError::Spawn)?;
        if !status.success() {
            return Err(AzCliError::CommandFailed("Azure login failed".to_string()));
        }
        Ok(())
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, AzCliError> {
        self.json(["account", "list", "--output", "json"]).await
    }

    async fn set_subscription(&self, subscription_id: &str) -> Result<(), AzCliError> {
        let output = self
            .output(["account", "set", "--subscription", subscription_id])
            .await?;
        if !output.status.success() {
            return Err(AzCliError::CommandFailed(failure_text(
                &output,
                "Failed to set subscription",
            )));
        }
        Ok(())
    }

    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>, AzCliError> {
        let mut groups: Vec<ResourceGroup> =
            self.json(["group", "list", "--output", "json"]).await?;
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }
}

#[async_trait]
impl TemplateValidator for AzureCli {
    async fn validate(&self, request: &DeploymentRequest) -> Result<(), AzCliError> {
        let mut command = self.command(validate_args(request))?;

        // The child is killed when the timed out future is dropped.
        let output = tokio::time::timeout(VALIDATION_TIMEOUT, command.output())
            .await
            .map_err(|_| AzCliError::TimedOut {
                operation: "Template validation",
                timeout: VALIDATION_TIMEOUT,
            })?
            .map_err(AzCliError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }
        Err(AzCliError::CommandFailed(validation_failure_message(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        )))
    }
}

#[async_trait]
impl TemplateDeployer for AzureCli {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        mode: DeploymentMode,
    ) -> Result<String, AzCliError> {
        let name = deployment_name(&request.template_file);
        let output = self.output(deploy_args(request, mode, &name)).await?;

        if !output.status.success() {
            return Err(AzCliError::CommandFailed(failure_text(
                &output,
                "Deployment failed",
            )));
        }
        debug!(deployment = %name, "deployment finished");
        Ok(name)
    }
}

fn template_args(request: &DeploymentRequest) -> Vec<OsString> {
    vec![
        "--resource-group".into(),
        request.resource_group.clone().into(),
        "--template-file".into(),
        request.template_file.clone().into(),
    ]
}

fn parameters_args(request: &DeploymentRequest) -> Vec<OsString> {
    match &request.parameters_file {
        Some(file) => {
            let mut value = OsString::from("@");
            value.push(file);
            vec!["--parameters".into(), value]
        }
        None => Vec::new(),
    }
}

fn validate_args(request: &DeploymentRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["deployment".into(), "group".into(), "validate".into()];
    args.extend(template_args(request));
    args.extend(["--output".into(), "json".into()]);
    args.extend(parameters_args(request));
    args
}

fn deploy_args(request: &DeploymentRequest, mode: DeploymentMode, name: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["deployment".into(), "group".into(), "create".into()];
    args.extend(template_args(request));
    args.extend([
        "--name".into(),
        name.into(),
        "--mode".into(),
        mode.to_string().into(),
    ]);
    args.extend(parameters_args(request));
    args
}

/// `<template stem>-<YYYYmmdd-HHMMSS>`
fn deployment_name(template_file: &Path) -> String {
    let file_name = template_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "{}-{}",
        stem(&file_name),
        Local::now().format("%Y%m%d-%H%M%S")
    )
}

static PARAMETER_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Please provide .+ value for '([^']+)'").expect("parameter prompt pattern")
});

/// Human readable reason for a failed `az deployment group validate`.
///
/// With stdin closed, a missing parameter makes `az` fail on its interactive
/// prompt with an EOF error; the parameter name is recovered from the prompt text.
pub fn validation_failure_message(stdout: &str, stderr: &str) -> String {
    let mut full = String::new();
    if !stdout.is_empty() {
        full.push_str(&format!("STDOUT: {stdout}\n"));
    }
    if !stderr.is_empty() {
        full.push_str(&format!("STDERR: {stderr}\n"));
    }

    let trimmed = full.trim();
    if trimmed.is_empty() {
        return "Template validation failed".to_string();
    }
    if !trimmed.contains("EOF when reading a line") {
        return trimmed.to_string();
    }

    match PARAMETER_PROMPT.captures(trimmed).and_then(|c| c.get(1)) {
        Some(name) => format!(
            "Missing or invalid parameter: '{}'. Check parameter name casing and structure in parameters file.",
            name.as_str()
        ),
        None => format!("Parameter validation failed. Full error details:\n{full}"),
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use mockall::mock;

    mock! {
        pub AzureCli {}

        #[async_trait]
        impl CliProbe for AzureCli {
            async fn version(&self) -> Result<Version, AzCliError>;
        }

        #[async_trait]
        impl AccountReader for AzureCli {
            async fn show_account(&self) -> Result<Account, AzCliError>;
            async fn show_tenant(&self, tenant_id: &str) -> Result<Tenant, AzCliError>;
        }

        #[async_trait]
        impl AccountManager for AzureCli {
            async fn login(&self, tenant_id: Option<String>) -> Result<(), AzCliError>;
            async fn list_subscriptions(&self) -> Result<Vec<Subscription>, AzCliError>;
            async fn set_subscription(&self, subscription_id: &str) -> Result<(), AzCliError>;
            async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>, AzCliError>;
        }

        #[async_trait]
        impl TemplateValidator for AzureCli {
            async fn validate(&self, request: &DeploymentRequest) -> Result<(), AzCliError>;
        }

        #[async_trait]
        impl TemplateDeployer for AzureCli {
            async fn deploy(&self, request: &DeploymentRequest, mode: DeploymentMode) -> Result<String, AzCliError>;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(parameters: Option<&str>) -> DeploymentRequest {
        DeploymentRequest {
            resource_group: "rg-app".to_string(),
            template_file: PathBuf::from("network.bicep"),
            parameters_file: parameters.map(PathBuf::from),
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_validate_args() {
        assert_eq!(
            strings(validate_args(&request(Some("parameters.dev.json")))),
            [
                "deployment",
                "group",
                "validate",
                "--resource-group",
                "rg-app",
                "--template-file",
                "network.bicep",
                "--output",
                "json",
                "--parameters",
                "@parameters.dev.json"
            ]
        );
    }

    #[test]
    fn test_deploy_args() {
        assert_eq!(
            strings(deploy_args(
                &request(None),
                DeploymentMode::Complete,
                "network-20250905-092907"
            )),
            [
                "deployment",
                "group",
                "create",
                "--resource-group",
                "rg-app",
                "--template-file",
                "network.bicep",
                "--name",
                "network-20250905-092907",
                "--mode",
                "Complete"
            ]
        );
    }

    #[test]
    fn test_deployment_name_uses_stem_and_timestamp() {
        let name = deployment_name(Path::new("infra/network.bicep"));
        let (prefix, timestamp) = name.split_at("network-".len());

        assert_eq!(prefix, "network-");
        assert_eq!(timestamp.len(), "20250905-092907".len());
        assert!(
            timestamp
                .chars()
                .all(|c| c.is_ascii_digit() || c == '-')
        );
    }

    #[test]
    fn test_validation_failure_extracts_missing_parameter() {
        let stderr = "Please provide object value for 'bottomLine' (? for help): \nERROR: EOF when reading a line";
        assert_eq!(
            validation_failure_message("", stderr),
            "Missing or invalid parameter: 'bottomLine'. Check parameter name casing and structure in parameters file."
        );
    }

    #[test]
    fn test_validation_failure_eof_without_parameter_name() {
        let message = validation_failure_message("", "ERROR: EOF when reading a line");
        assert_eq!(
            message,
            "Parameter validation failed. Full error details:\nSTDERR: ERROR: EOF when reading a line\n"
        );
    }

    #[test]
    fn test_validation_failure_combines_streams() {
        assert_eq!(
            validation_failure_message("{\"error\": 1}", "ERROR: InvalidTemplate"),
            "STDOUT: {\"error\": 1}\nSTDERR: ERROR: InvalidTemplate"
        );
        assert_eq!(
            validation_failure_message("", ""),
            "Template validation failed"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = AzCliError::TimedOut {
            operation: "Template validation",
            timeout: VALIDATION_TIMEOUT,
        };
        assert_eq!(
            err.to_string(),
            "Template validation timed out after 30 seconds"
        );
    }
}
