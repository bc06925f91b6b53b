//! # Enricher
//!
//! Main library for the post enricher.
//!
//! This crate provides the configuration, dependency wiring and logging
//! setup used by the `enricher` binary.

pub mod config;
pub mod logging;

pub use config::{Dependencies, Settings};

use thiserror::Error;

/// Errors that can occur during enricher initialization or execution.
#[derive(Error, Debug)]
pub enum EnricherError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] enricher_pipeline::PipelineError),

    /// Stream error.
    #[error("Stream error: {0}")]
    StreamError(#[from] enricher_repository::StreamError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EnricherError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
