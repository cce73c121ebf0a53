pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoDataset, JobSeedInfo, SeedResult, VerificationResult};
pub use stores::{in_memory_context, sqlite_context};
