use super::ui;
use crate::core::model::HealthStatus;
use crate::core::orchestrator::DataOrchestrator;
use anyhow::{Context, Result};

pub async fn run(orchestrator: &DataOrchestrator, base_url: &str) -> Result<()> {
    let health = orchestrator
        .health()
        .await
        .with_context(|| format!("Dashboard service at {base_url} is unreachable"))?;
    println!("{}", render_health(&health, base_url));
    Ok(())
}

pub fn render_health(health: &HealthStatus, base_url: &str) -> String {
    let status_style = if health.status.eq_ignore_ascii_case("healthy") {
        ui::StyleType::Highlight
    } else {
        ui::StyleType::Error
    };
    format!(
        "{} {}\n{} {}\n{} {}",
        ui::style_text("Service:", ui::StyleType::Label),
        base_url,
        ui::style_text("Status:", ui::StyleType::Label),
        ui::style_text(&health.status, status_style),
        ui::style_text("Last data refresh:", ui::StyleType::Label),
        health.last_data_refresh.as_deref().unwrap_or("never"),
    )
}
