pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod dedup;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod plugins;
