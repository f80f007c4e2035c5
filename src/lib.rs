pub mod anomaly;
pub mod config;
pub mod indexer;
pub mod metrics;
pub mod pipeline;
