//! Core types and computations for Energy-saving Trial Verification (ETV).
//!
//! Holds the per-household data model, the compact telemetry record, the
//! energy-vs-HDD regression engine, result filters and shared helpers used by
//! the ingestion and runtime crates.

pub mod error;
pub mod filters;
pub mod formatting;
pub mod models;
pub mod regression;
pub mod settings;
pub mod telemetry;
pub mod time_utils;

pub use error::{EtvError, Result};
