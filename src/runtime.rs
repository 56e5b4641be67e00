//! Runtime glue: configuration, the error taxonomy, tracing and telemetry,
//! and the fire-and-forget runner for top-level routines.

pub mod config;
pub mod error;
pub mod runner;
pub mod telemetry;
