pub mod api;
pub mod args;
pub mod config;
pub mod error;
pub mod models;
pub mod proxies;
pub mod report;
pub mod speedtest;
pub mod telemetry;
pub mod unlock;
pub mod utils;
