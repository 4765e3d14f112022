pub mod addresses;
pub mod config;
pub mod error;
pub mod location;
pub mod telemetry;
