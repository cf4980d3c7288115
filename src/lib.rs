pub mod actors;
pub mod app;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod messaging;
pub mod metrics;
pub mod utils;

pub use app::Services;
pub use config::AppConfig;
