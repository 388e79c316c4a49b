//! Bulk, resumable retrieval of HPD I-card records for NYC addresses.
//!
//! Input addresses are filtered against prior logs, looked up through a
//! two-step form exchange by a fixed pool of workers, and appended to a
//! success log or a failure log.

pub mod address;
pub mod cli;
pub mod compare;
pub mod config;
pub mod input;
pub mod logger;
pub mod orchestrator;
pub mod page;
pub mod pool;
pub mod protocol;
pub mod queue;
pub mod resume;
pub mod store;
pub mod transport;

pub use address::{AddressKey, Borough, WorkItem};
pub use config::RunConfig;
pub use orchestrator::RunSummary;
pub use protocol::{LookupOutcome, LookupProtocol};
