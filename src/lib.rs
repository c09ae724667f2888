pub mod config;
pub mod coordinator;
pub mod format;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod upstream;
