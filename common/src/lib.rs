pub mod config;
pub mod multipart;
pub mod telemetry;
