use super::ui;
use crate::core::config::RefreshConfig;
use crate::core::lifecycle::{TriggerOutcome, UpdateLifecycle};
use crate::core::orchestrator::DataOrchestrator;
use anyhow::{Result, bail};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const WAIT_POLL: Duration = Duration::from_millis(100);

/// Triggers a server-side update. With `wait`, stays around for the delayed
/// re-fetch and reports what it loaded.
pub async fn run(orchestrator: Arc<DataOrchestrator>, refresh: &RefreshConfig, wait: bool) -> Result<()> {
    let lifecycle = UpdateLifecycle::new(Arc::clone(&orchestrator), refresh);

    let spinner = ui::new_spinner("Triggering update");
    let outcome = lifecycle.trigger_update().await;
    spinner.finish_and_clear();

    let status = lifecycle.status();
    match outcome {
        TriggerOutcome::Completed => {
            println!(
                "{} {}",
                ui::style_text("Update started:", ui::StyleType::Highlight),
                status.message.as_deref().unwrap_or_default()
            );
        }
        TriggerOutcome::AlreadyUpdating => {
            println!("{}", ui::style_text("An update is already running", ui::StyleType::Subtle));
            return Ok(());
        }
        TriggerOutcome::Failed => {
            bail!(status.error.unwrap_or_else(|| "Failed to trigger update".to_string()));
        }
    }

    if wait {
        let spinner = ui::new_spinner(&format!(
            "Waiting {}s for fresh data",
            refresh.settle_delay().as_secs()
        ));
        while lifecycle.has_pending_refetch().await {
            tokio::time::sleep(WAIT_POLL).await;
        }
        spinner.finish_and_clear();
        debug!("Delayed re-fetch finished");

        let state = orchestrator.state();
        if let Some(error) = state.error {
            bail!(error);
        }
        if let Some(snapshot) = state.snapshot {
            println!(
                "Loaded {} countries, {} industries, {} sectors and {} time points",
                snapshot.countries.len(),
                snapshot.industries.len(),
                snapshot.sectors.len(),
                snapshot.time_series.len()
            );
        }
    }

    lifecycle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::CompositePayload;
    use crate::core::source::testing::MockSource;
    use std::sync::atomic::Ordering;

    fn refresh_config() -> RefreshConfig {
        RefreshConfig {
            poll_interval_secs: 300,
            settle_delay_secs: 5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_and_wait_loads_snapshot() {
        let source = Arc::new(MockSource::default());
        *source.composite.lock().unwrap() = Some(CompositePayload::default());
        let orchestrator = Arc::new(DataOrchestrator::new(source.clone()));

        run(Arc::clone(&orchestrator), &refresh_config(), true).await.unwrap();

        assert_eq!(source.calls("refresh"), 1);
        assert_eq!(source.calls("composite"), 1);
        assert!(orchestrator.current_snapshot().is_some());
        assert!(orchestrator.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_update_is_an_error() {
        let source = Arc::new(MockSource::default());
        source.fail_refresh.store(true, Ordering::SeqCst);
        let orchestrator = Arc::new(DataOrchestrator::new(source.clone()));

        let err = run(orchestrator, &refresh_config(), true).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to trigger update"));
        assert_eq!(source.calls("composite"), 0);
    }
}
