//! # Chorus Common Library
//!
//! Core of the Chorus song and program service:
//! - Database initialization, migrations and row models
//! - Append-only song version store
//! - Current program version resolution and recursive composition
//! - Label-based feedback aggregation (votes, comments)
//! - Changelog diff summaries
//! - Configuration loading and collaborator ports (rendering, admin gate, media)

pub mod changelog;
pub mod composition;
pub mod config;
pub mod db;
pub mod error;
pub mod feedback;
pub mod ports;
pub mod programs;
pub mod render;
pub mod time;
pub mod versions;

pub use db::{Database, SchemaInfo};
pub use error::{Error, Result};
