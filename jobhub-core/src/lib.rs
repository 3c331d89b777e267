//! Jobhub Core
//!
//! Core types shared by the jobhub queue store, runner and CLI.
//!
//! This crate contains:
//! - Domain types: the job record and its status vocabulary
//! - DTOs: requests handed to the queue store
//! - Layout: names of the files that make up a job directory on disk

pub mod domain;
pub mod dto;
pub mod layout;
