use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

pub const LOCAL_PARAMETER_FILE: &str = "parameters.local.json";

const PARAMETERS_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentParameters.json#";

fn is_parameter_file(name: &str) -> bool {
    name.strip_prefix("parameters.")
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|middle| !middle.is_empty())
}

/// Sorted `parameters.*.json` files in `dir`.
///
/// `parameters.local.json` is scaffolded first when it does not exist.
pub fn parameter_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let local = dir.join(LOCAL_PARAMETER_FILE);
    if !local.exists() {
        write_scaffold(&local)?;
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry.context("reading directory entry")?;
        let is_match = entry.file_name().to_str().is_some_and(is_parameter_file);
        if is_match && entry.path().is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

fn write_scaffold(path: &Path) -> Result<()> {
    let scaffold = json!({
        "$schema": PARAMETERS_SCHEMA,
        "contentVersion": "1.0.0.0",
        "parameters": {
            "environment": { "value": "test" }
        }
    });

    let content = serde_json::to_string_pretty(&scaffold).context("serializing parameter scaffold")?;
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;

    info!(path = %path.display(), "created parameter file scaffold");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::tempdir;

    #[test]
    fn test_scaffolds_local_file_when_missing() {
        let dir = tempdir().unwrap();

        let files = parameter_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join(LOCAL_PARAMETER_FILE)]);

        let scaffold: Value =
            serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(scaffold["contentVersion"], "1.0.0.0");
        assert_eq!(scaffold["parameters"]["environment"]["value"], "test");
    }

    #[test]
    fn test_existing_local_file_is_left_alone() {
        let dir = tempdir().unwrap();
        let local = dir.path().join(LOCAL_PARAMETER_FILE);
        fs::write(&local, "{}").unwrap();

        parameter_files(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&local).unwrap(), "{}");
    }

    #[test]
    fn test_lists_only_matching_files_sorted() {
        let dir = tempdir().unwrap();
        for name in [
            "parameters.prod.json",
            "parameters.dev.json",
            "parameters.json",
            "main.bicep",
            "other.prod.json",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let names: Vec<_> = parameter_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            names,
            [
                "parameters.dev.json",
                "parameters.local.json",
                "parameters.prod.json"
            ]
        );
    }
}
