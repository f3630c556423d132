//! Emitters for the generated artifacts.
//!
//! Each emitter produces one or more [`Artifact`]s: a path relative to the
//! output directory plus the full file content. Every artifact is prefixed
//! with an autogenerated banner and wrapped in an idempotent include guard.

pub mod commands;
pub mod events;
pub mod features;
pub mod messages;

use std::path::PathBuf;

/// One generated output file.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Path relative to the configured output directory.
    pub rel_path: PathBuf,

    /// Complete file content.
    pub content: String,
}

/// Banner line prefixed to every artifact.
pub const BANNER: &str = "/* This file is autogenerated by gluegen. DO NOT EDIT! */";

/// Wrap an emitted body in the banner and an include guard.
pub(crate) fn guarded(guard: &str, body: &str) -> String {
    format!(
        "{BANNER}\n\n#ifndef INC_{guard}_H\n#define INC_{guard}_H\n\n{}\n#endif\n",
        body.trim_end_matches('\n')
    )
}
