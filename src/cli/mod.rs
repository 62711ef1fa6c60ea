pub mod history;
pub mod ingest;
pub mod quotes;
pub mod setup;
pub mod ui;
