pub mod api;
pub mod commercetools;
pub mod config;
pub mod correlation;
pub mod decoder;
pub mod dispatcher;
pub mod gates;
pub mod http;
pub mod jobs;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AppState, build_router};
pub use config::Config;
