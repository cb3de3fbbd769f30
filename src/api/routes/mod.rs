pub mod admin;
pub mod ingest;
pub mod plugins;
pub mod stats;
