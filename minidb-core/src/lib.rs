pub mod config;
pub mod crawl;
pub mod error;
pub mod profile;
pub mod report;
pub mod sampling;

pub use config::{Config, Strategy, StrategyEntry};
pub use crawl::Crawler;
pub use error::MiniDbError;
pub use profile::{Profile, ProfileSet};
pub use sampling::SamplingPolicy;
