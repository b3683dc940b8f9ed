//! Command-line host for readaloud.
//!
//! The binary stands in for an editor integration: it supplies the selected
//! text and raw preferences, renders pipeline notifications on stderr, and
//! maps failures to process exit codes.

#![deny(unused_crate_dependencies)]

// Dependencies used only by the binary target
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use commands::{Commands, PipelineOptions};
pub use error::CliError;
pub use parser::Cli;
