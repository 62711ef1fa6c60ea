use super::ui;
use crate::gateway::Gateway;
use crate::gateway::ingest::{IngestSummary, ingest};
use anyhow::Result;

pub async fn run(gateway: &Gateway, tickers: &[String], historical: bool) -> Result<()> {
    if tickers.is_empty() {
        println!("No tickers configured for ingestion.");
        return Ok(());
    }

    let flows = if historical { 2 } else { 1 };
    let pb = ui::new_progress_bar((tickers.len() * flows) as u64);
    let summary = ingest(gateway, tickers, historical, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!(
        "{} {}",
        ui::style_text("Quotes saved:", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{}/{}", summary.saved, summary.total),
            ui::StyleType::TotalValue
        )
    );
    if let Some(history_saved) = summary.history_saved {
        println!(
            "{} {}",
            ui::style_text("History saved:", ui::StyleType::TotalLabel),
            ui::style_text(
                &format!("{history_saved}/{}", summary.total),
                ui::StyleType::TotalValue
            )
        );
    }
}
