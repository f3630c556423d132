//! Input discovery.
//!
//! Inputs are annotated C source files. They arrive either as positional
//! paths on the command line or by walking a directory (gitignore rules
//! respected, with an optional glob filter). Either way, every input's
//! filename must fit the `<module>.<ext>` convention, because the module
//! name is derived from it.

use crate::error::{CliResult, ScanError};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Derive the module name from an input filename.
///
/// The filename must be `<module>.<expected>`; anything else is fatal,
/// since a wrong extension usually means the wrong file was listed.
pub fn module_name(path: &Path, expected_ext: &str) -> Result<String, ScanError> {
    let bad = || ScanError::BadFileName {
        path: path.to_path_buf(),
        expected: expected_ext.to_string(),
    };
    if path.extension().and_then(|e| e.to_str()) != Some(expected_ext) {
        return Err(bad());
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(bad)?;
    Ok(stem.to_string())
}

/// Scanner for discovering annotated source files under a directory.
#[derive(Debug)]
pub struct SourceScanner {
    /// Root directory to scan.
    root: PathBuf,

    /// Extension of annotated sources.
    extension: String,

    /// Whether to respect .gitignore files.
    respect_gitignore: bool,

    /// Optional glob filter pattern.
    filter: Option<glob::Pattern>,
}

impl SourceScanner {
    /// Create a new scanner for the given root directory.
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            respect_gitignore: true,
            filter: None,
        }
    }

    /// Set whether to respect .gitignore files.
    pub fn with_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    /// Set a glob filter pattern; only matching files are included.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self, ScanError> {
        let glob_pattern = glob::Pattern::new(pattern)
            .map_err(|e| ScanError::invalid_pattern(pattern, e.to_string()))?;
        self.filter = Some(glob_pattern);
        Ok(self)
    }

    /// Scan the directory and return all discovered source files, sorted by
    /// path for deterministic pass order.
    pub fn scan(&self) -> CliResult<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(ScanError::not_found(self.root.clone()).into());
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .hidden(false)
            .build();

        for entry in walker {
            let entry = entry.map_err(ScanError::Walk)?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            if path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(true, |ext| ext != self.extension)
            {
                continue;
            }
            if let Some(ref pattern) = self.filter {
                if !pattern.matches_path(&self.relative_path(path)) {
                    continue;
                }
            }
            files.push(path.to_path_buf());
        }

        if files.is_empty() {
            return Err(ScanError::NoSourceFiles {
                path: self.root.clone(),
            }
            .into());
        }

        files.sort();
        Ok(files)
    }

    /// Get the relative path from root.
    fn relative_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
