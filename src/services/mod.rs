pub mod ai;
pub mod ingestion;
