pub mod connection;
pub mod new_requests;
pub mod schema;

pub use connection::Database;
pub use new_requests::{NewRequestModel, ScanCount, ScanStatus, StoredRequest};
