//! Error types for the generator.
//!
//! Every error here is fatal by design: the tool is a build-time
//! correctness gate, so any inconsistency in the declarative metadata
//! aborts the run rather than being patched over.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for generator operations.
pub type CliResult<T> = Result<T, CliError>;

/// Main error type for generator operations.
#[derive(Debug, Error)]
pub enum CliError {
    /// Error during input discovery.
    #[error("Failed to scan inputs: {0}")]
    Scan(#[from] ScanError),

    /// Error during metadata extraction.
    #[error("Failed to extract metadata: {0}")]
    Extract(#[from] ExtractError),

    /// Inconsistency in the declared metadata.
    #[error("Metadata error: {0}")]
    Build(#[from] BuildError),

    /// Error loading configuration.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    /// Error writing output files.
    #[error("Failed to write output: {0}")]
    Write(#[from] WriteError),

    /// Error during file watching.
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during input discovery.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Directory does not exist.
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// No annotated source files were found.
    #[error("No source files found in: {path}")]
    NoSourceFiles { path: PathBuf },

    /// Input filename does not match the module naming convention.
    #[error("Input filename doesn't fit the `<module>.{expected}` convention: {path}")]
    BadFileName { path: PathBuf, expected: String },

    /// Invalid filter pattern.
    #[error("Invalid filter pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Error from ignore crate walker.
    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),
}

/// Error during metadata extraction from a source file.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Malformed annotation.
    #[error("Malformed annotation in {file}:{line}: {message}")]
    Malformed {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// IO error reading the file.
    #[error("Failed to read {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Inconsistency detected while building the symbol tables or graph.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The same event was defined twice.
    #[error("Duplicate event definition `{name}`")]
    DuplicateEvent { name: String },

    /// A handler was registered for an event nobody defined.
    #[error("Module `{module}` tried to handle non-existent event `{event}`")]
    UnknownEvent { module: String, event: String },

    /// A feature depends on a feature nobody declared.
    #[error("Feature `{feature}` tried to depend on non-existent feature `{dependency}`")]
    UnknownFeature { feature: String, dependency: String },

    /// Hard/optional dependencies form a cycle.
    #[error("Dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// A message field references a schema nobody declared.
    #[error("Field `{field}` of `{schema}` references non-existent schema `{referenced}`")]
    UnknownSchema {
        schema: String,
        field: String,
        referenced: String,
    },

    /// Nested map references form a cycle, so the message has no finite size.
    #[error("Recursive message schema `{name}`")]
    RecursiveSchema { name: String },
}

/// Error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid TOML syntax.
    #[error("Invalid TOML in {path}: {message}")]
    InvalidToml { path: PathBuf, message: String },

    /// IO error reading config.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error writing output files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to create the output directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to fully write an artifact (possibly truncated output).
    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error during file watching.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize watcher.
    #[error("Failed to initialize file watcher: {0}")]
    Init(String),
}

impl ExtractError {
    /// Create a malformed-annotation error with location information.
    pub fn malformed(file: PathBuf, line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            file,
            line,
            message: message.into(),
        }
    }
}

impl ScanError {
    /// Create a directory not found error.
    pub fn not_found(path: PathBuf) -> Self {
        Self::DirectoryNotFound { path }
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

impl CliError {
    /// Whether this error reflects inconsistent metadata (as opposed to an
    /// environmental failure). Used to pick the process exit code.
    pub fn is_metadata_error(&self) -> bool {
        matches!(self, CliError::Build(_) | CliError::Extract(_))
    }
}
