use super::ui;
use crate::core::response::HistoricalResponse;
use crate::gateway::Gateway;
use anyhow::Result;
use comfy_table::{Cell, Table};

pub async fn run(
    gateway: &Gateway,
    symbol: &str,
    period: Option<&str>,
    interval: Option<&str>,
    json: bool,
) -> Result<()> {
    let served = gateway.history(symbol, period, interval).await?;
    let response = &served.value;

    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    println!(
        "\n{} {}",
        ui::style_text(&response.symbol, ui::StyleType::Title),
        ui::style_text(
            &format!("{} / {}", response.period, response.interval),
            ui::StyleType::Subtle
        )
    );
    if response.data.is_empty() {
        println!("No historical data available.");
    } else {
        println!("{}", history_table(response));
    }
    println!("{}", ui::provenance_line(&response.timestamp, served.source));
    Ok(())
}

fn history_table(response: &HistoricalResponse) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Time"),
        ui::header_cell("Open"),
        ui::header_cell("High"),
        ui::header_cell("Low"),
        ui::header_cell("Close"),
        ui::header_cell("Volume"),
    ]);

    for bar in &response.data {
        table.add_row(vec![
            Cell::new(bar.time.to_string()),
            ui::number_cell(bar.open),
            ui::number_cell(bar.high),
            ui::number_cell(bar.low),
            ui::number_cell(bar.close),
            ui::format_optional_cell(bar.volume, |v| v.to_string()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::BarTime;
    use crate::core::response::OhlcData;
    use chrono::NaiveDate;

    #[test]
    fn test_history_table_rows() {
        let response = HistoricalResponse {
            symbol: "SPY".to_string(),
            period: "5d".to_string(),
            interval: "1d".to_string(),
            timestamp: "2024-03-01 16:00:00".to_string(),
            data: vec![OhlcData {
                time: BarTime::Day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                open: 508.1,
                high: 513.29,
                low: 507.5,
                close: 512.85,
                volume: None,
            }],
        };

        let rendered = history_table(&response).to_string();
        assert!(rendered.contains("2024-03-01"));
        assert!(rendered.contains("513.29"));
        assert!(rendered.contains("512.85"));
        assert!(rendered.contains("N/A"));
    }
}
