pub mod config;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod model;
pub mod provider;
pub mod stream;
pub mod telemetry;
