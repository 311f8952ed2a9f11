pub mod cache;
pub mod client;
pub mod error;

pub use cache::CacheStore;
pub use client::{MetricsSnapshot, PortalClient};
pub use error::ClientError;
