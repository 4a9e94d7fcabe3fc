use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, fmt::writer::MakeWriterExt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_ENV: &str = "BICEP_DEPLOY_LOG";
const LOG_ALL_ENV: &str = "BICEP_DEPLOY_LOG_ALL";
const LOG_DIR: &str = "logs";
const LATEST_LOG: &str = "deployment-latest.log";

/// The log files of one interactive session: a timestamped one and `deployment-latest.log`.
pub struct DeploymentLog {
    path: PathBuf,
    session: File,
    latest: File,
}

impl DeploymentLog {
    /// Create both files under `<dir>/logs` and write the session header.
    pub fn create(dir: &Path, resource_group: &str) -> Result<Self> {
        let log_dir = dir.join(LOG_DIR);
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating {}", log_dir.display()))?;

        let now = Local::now();
        let path = log_dir.join(format!("deployment-{}.log", now.format("%Y-%m-%d_%H-%M-%S")));
        let mut session =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let latest_path = log_dir.join(LATEST_LOG);
        let mut latest = File::create(&latest_path)
            .with_context(|| format!("creating {}", latest_path.display()))?;

        let header = format!(
            "=== Bicep deployment session ===\nStarted: {}\nResource group: {resource_group}\n\n",
            now.format("%Y-%m-%d %H:%M:%S")
        );
        for file in [&mut session, &mut latest] {
            file.write_all(header.as_bytes())
                .context("writing log header")?;
        }

        Ok(Self {
            path,
            session,
            latest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Build the filter for one layer: `level` for this crate, or for every crate
/// when `BICEP_DEPLOY_LOG_ALL` is set.
fn filter(level: &str) -> EnvFilter {
    if env::var(LOG_ALL_ENV).is_ok() {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(format!("bicep_deploy={level}"))
    }
}

/// Setup logging.
///
/// Logs only reach the console when `debug` is set or `BICEP_DEPLOY_LOG` names a
/// level, so they do not interleave with the menu. The deployment log, when given,
/// receives everything at `info` (or the requested level) without colors.
pub fn setup_logging(debug: bool, deployment_log: Option<DeploymentLog>) {
    let requested = env::var(LOG_ENV).ok();
    let level = match (debug, &requested) {
        (true, _) => "debug".to_string(),
        (false, Some(level)) => level.clone(),
        (false, None) => "info".to_string(),
    };

    let console = (debug || requested.is_some()).then(|| {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(filter(&level))
    });

    let file = deployment_log.map(|log| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(log.session).and(Mutex::new(log.latest)))
            .with_filter(filter(&level))
    });

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_deployment_log_files_carry_header() {
        let dir = tempdir().unwrap();
        let log = DeploymentLog::create(dir.path(), "rg-test").unwrap();

        let name = log.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("deployment-") && name.ends_with(".log"));
        assert_ne!(name, LATEST_LOG);

        for path in [log.path().to_path_buf(), dir.path().join(LOG_DIR).join(LATEST_LOG)] {
            let content = fs::read_to_string(path).unwrap();
            assert!(content.starts_with("=== Bicep deployment session ==="));
            assert!(content.contains("Resource group: rg-test"));
        }
    }
}
