//! Request types consumed by the queue store

pub mod job;
