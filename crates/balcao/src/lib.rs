pub mod config;
pub mod error;
pub mod marketplace;
pub mod session;
pub mod telemetry;
pub mod webhook;
pub mod workflows;
