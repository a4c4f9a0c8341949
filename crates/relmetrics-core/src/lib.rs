//! Core library for relmetrics.
//!
//! This crate provides the types and operations behind the `relmetrics`
//! CLI: walking the tagged releases of a Java project, building each one,
//! running an analysis tool on it, and turning the reports into trend charts.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading and management
//! - [`github`] - Release list from the GitHub tags API
//! - [`git`] - Working copy operations (clone, checkout, reset)
//! - [`maven`] - Builds and POM adjustments
//! - [`tools`] - SpotBugs, CK and JaCoCo invocation and report parsing
//! - [`pipeline`] - The per-release checkout/build/analyze loop
//! - [`preflight`] - Tool and working copy checks before a run
//! - [`detect`] - External tool detection
//! - [`version`] - Release labels and ordering
//! - [`table`] - Metric rows and per-release aggregation
//! - [`health`] - Code health index over CK metrics
//! - [`trends`] - Charts from stored reports
//! - [`chart`] - SVG line chart rendering
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```no_run
//! use relmetrics_core::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//! println!("Target: {}", config.repository());
//! # Ok::<(), relmetrics_core::error::ConfigError>(())
//! ```
#![deny(unsafe_code)]

pub mod chart;

pub mod config;

pub mod detect;

pub mod error;

pub mod git;

pub mod github;

pub mod health;

pub mod maven;

pub mod pipeline;

pub mod preflight;

pub mod table;

pub mod tools;

pub mod trends;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use tools::Tool;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
