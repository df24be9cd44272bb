//! Reporting compliance engine for regional tourism stakeholders.
//!
//! Stakeholders submit monthly visitor and occupancy statistics. The engine
//! derives a compliance status for each of them, aggregates the submitted
//! figures for the admin dashboard, renders CSV exports and runs a daily
//! sweep that reminds stakeholders who have not reported yet.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
