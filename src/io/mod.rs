//! Telemetry output.

pub mod export;
