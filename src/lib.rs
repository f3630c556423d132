//! # gluegen
//!
//! Library behind the `gluegen` CLI: an offline, metadata-driven generator
//! that turns declarative annotations scattered across C source modules
//! into compiled glue headers for three concerns: feature initialization
//! ordering with failure-status propagation, event dispatch between
//! producer and handler modules, and a compact binary message codec.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and TOML parsing
//! - [`scanner`] - Input discovery and module-name derivation
//! - [`extract`] - Per-file annotation extraction
//! - [`model`] - Features, events, message schemas and their tables
//! - [`graph`] - Dependency linking and topological scheduling
//! - [`emit`] - The four artifact emitters
//! - [`driver`] - The three-pass build pipeline
//! - [`writer`] - File output and dry-run support
//! - [`watcher`] - File system watching for development mode
//! - [`error`] - Error types and handling

pub mod config;
pub mod driver;
pub mod emit;
pub mod error;
pub mod extract;
pub mod graph;
pub mod model;
pub mod scanner;
pub mod watcher;
pub mod writer;

// Re-export main types for convenience
pub use config::{Config, ConfigManager};
pub use driver::BuildContext;
pub use error::{CliError, CliResult};
pub use extract::SourceUnit;
pub use model::{Event, Feature, MessageSchema};
pub use scanner::SourceScanner;
pub use watcher::FileWatcher;
pub use writer::FileWriter;
