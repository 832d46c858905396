use super::show::{self, ShowOptions, View};
use super::ui;
use crate::core::config::AppConfig;
use crate::core::lifecycle::UpdateLifecycle;
use crate::core::model::DashboardSnapshot;
use crate::core::orchestrator::DataOrchestrator;
use anyhow::{Result, bail};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Polls the service and re-renders the view whenever a new snapshot lands,
/// until Ctrl-C.
pub async fn run(orchestrator: Arc<DataOrchestrator>, config: &AppConfig, options: ShowOptions) -> Result<()> {
    let lifecycle = UpdateLifecycle::new(orchestrator, &config.refresh);
    watch_until(&lifecycle, config.view.page_size, options, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await
}

pub(crate) async fn watch_until(
    lifecycle: &UpdateLifecycle,
    page_size: usize,
    options: ShowOptions,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    if options.view == View::Measures {
        bail!("The measures view cannot be watched");
    }
    let orchestrator = lifecycle.orchestrator();
    let mut state = options.view_state(page_size);
    let mut updates = orchestrator.subscribe();

    // Failures are already in the state and rendered below.
    let _ = orchestrator.load_snapshot(options.refresh).await;
    lifecycle.start_polling().await;
    info!("Watching for dashboard updates");

    let mut last_snapshot: Option<Arc<DashboardSnapshot>> = None;
    let mut last_error: Option<String> = None;
    tokio::pin!(shutdown);
    loop {
        let current = updates.borrow_and_update().clone();
        if let Some(snapshot) = &current.snapshot
            && !last_snapshot.as_ref().is_some_and(|last| Arc::ptr_eq(last, snapshot))
        {
            if last_snapshot.is_none() {
                options.apply_selections(&mut state, snapshot);
            } else if state.reconcile(snapshot) {
                println!("{}", ui::style_text("Selection no longer present, cleared", ui::StyleType::Subtle));
            }
            ui::print_separator();
            println!("{}", show::render(options.view, snapshot, &state));
            last_snapshot = Some(Arc::clone(snapshot));
        }
        if current.error != last_error {
            if let Some(error) = &current.error {
                println!("{}", ui::style_text(error, ui::StyleType::Error));
            }
            last_error = current.error;
        }

        tokio::select! {
            _ = &mut shutdown => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    lifecycle.shutdown().await;
    info!("Stopped watching");
    Ok(())
}
