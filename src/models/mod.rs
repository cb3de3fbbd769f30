pub mod telemetry;
pub mod vector;

pub use telemetry::*;
pub use vector::*;
