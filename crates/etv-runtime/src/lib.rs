//! Runtime orchestration layer for the ETV pipeline.
//!
//! Drives the ingestion and regression stages over an input directory and
//! writes the per-household and summary CSV outputs.

pub mod orchestrator;
pub mod output;

pub use etv_core as core;
pub use etv_data as data;
