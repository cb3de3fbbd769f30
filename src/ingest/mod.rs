pub mod admin;
pub mod channels;
pub mod registry;
pub mod router;
pub mod stats;
pub mod store;

pub use admin::{admin_channel, AdminAction, AdminHandle, AdminQueue};
pub use channels::ResultChannels;
pub use registry::{ModelRegistry, MODEL_TTL};
pub use router::{Envelope, IngestionRouter, Outcome};
pub use stats::{IngestStats, StatsSnapshot};
pub use store::{RequestStore, StoreFactory};
