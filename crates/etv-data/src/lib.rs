//! Data ingestion layer for the ETV pipeline.
//!
//! Locates and opens input files (plain or gzipped), parses the bulk energy,
//! heating-degree-day and device log formats, segments households into
//! saving / normal days, and joins everything into per-household inputs.

pub mod activity_log;
pub mod aggregator;
pub mod bulk_energy;
pub mod hdd;
pub mod reader;

pub use etv_core as core;
