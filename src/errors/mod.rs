pub mod types;
pub mod classification;

pub use types::IastError;
pub use classification::ErrorClassification;
