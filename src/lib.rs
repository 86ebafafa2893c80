pub mod config;
pub mod execution;
pub mod models;
pub mod risk;
pub mod telemetry;
