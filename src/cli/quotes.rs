use super::ui;
use crate::core::response::QuotesResponse;
use crate::gateway::Gateway;
use anyhow::Result;
use comfy_table::{Cell, Table};

pub async fn run(gateway: &Gateway, symbols: &[String], json: bool) -> Result<()> {
    let served = gateway.quotes(symbols).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&served.value)?);
        return Ok(());
    }

    println!("{}", quotes_table(&served.value));
    println!(
        "{}",
        ui::provenance_line(&served.value.timestamp, served.source)
    );
    Ok(())
}

fn quotes_table(response: &QuotesResponse) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Price"),
        ui::header_cell("Volume"),
    ]);

    for ticker in &response.tickers {
        table.add_row(vec![
            Cell::new(&ticker.symbol),
            ui::format_optional_cell(ticker.price, |p| format!("{p:.2}")),
            ui::format_optional_cell(ticker.volume, |v| v.to_string()),
        ]);
    }
    table
}
