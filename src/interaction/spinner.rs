use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use super::{Interaction, SpinnerHandle, SpinnerInteraction};

impl SpinnerInteraction for Interaction {
    fn start_spinner(&self, message: String) -> Result<SpinnerHandle> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .context("building spinner style")?;

        let progress_bar = ProgressBar::new_spinner().with_style(style);
        progress_bar.set_message(message);
        progress_bar.enable_steady_tick(Duration::from_millis(80));

        Ok(SpinnerHandle::new(Box::new(move || {
            // Disabling the steady tick joins the ticker thread.
            progress_bar.disable_steady_tick();
            progress_bar.finish_and_clear();
        })))
    }
}

/// Run `operation` while a spinner shows `message` and the elapsed time.
///
/// The operation only starts once the spinner is up, and the spinner is stopped
/// before this returns, whatever the operation's outcome.
pub async fn with_progress<S, O, F>(
    spinner: &S,
    message: impl Into<String>,
    operation: O,
) -> Result<F::Output>
where
    S: SpinnerInteraction + ?Sized,
    O: FnOnce() -> F,
    F: Future,
{
    let handle = spinner.start_spinner(message.into())?;
    let output = operation().await;
    drop(handle);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::interaction::mocks::MockInteraction;

    #[tokio::test]
    async fn test_with_progress_stops_spinner_before_returning() {
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_by_handle = stopped.clone();

        let mut interaction = MockInteraction::new();
        interaction
            .expect_start_spinner()
            .withf(|message| message == "Validating app.bicep")
            .return_once(move |_| {
                Ok(SpinnerHandle::new(Box::new(move || {
                    stopped_by_handle.store(true, Ordering::SeqCst);
                })))
            });

        let output = with_progress(&interaction, "Validating app.bicep", || async {
            Err::<(), _>("boom")
        })
        .await
        .unwrap();

        assert_eq!(output, Err("boom"));
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_with_progress_fails_when_spinner_cannot_start() {
        let mut interaction = MockInteraction::new();
        interaction
            .expect_start_spinner()
            .return_once(|_| Err(anyhow::anyhow!("no terminal")));

        let mut started = false;
        let result = with_progress(&interaction, "Deploying", || {
            started = true;
            async { 42 }
        })
        .await;
        assert!(result.is_err());
        assert!(!started);
    }
}
