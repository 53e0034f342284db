/// Accelerated virtual clock.
pub mod clock;
/// Incremental-conductance MPPT.
pub mod controller;
pub mod engine;
pub mod kpi;
pub mod types;
