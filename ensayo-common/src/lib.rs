//! # Ensayo Common Library
//!
//! Shared code for the Ensayo content services:
//! - Entity models for the course hierarchy, learners and progress
//! - SQLite schema initialization and migrations
//! - Bootstrap configuration loading
//! - Error type shared by every crate

pub mod config;
pub mod db;
pub mod error;
pub mod uuid_utils;

pub use error::{Error, Result};
