//! Core domain types
//!
//! These types describe a queued job as the store persists it and as the
//! runner executes it.

pub mod job;
