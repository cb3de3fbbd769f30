pub mod commands;
pub mod plugins;
pub mod serve;

pub use commands::{Cli, Commands};
