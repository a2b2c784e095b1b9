//! Compression detection by file extension. Recompression itself is done by
//! the tools a script already has on its path; scripts only need to agree on
//! what a file claims to be.

#![allow(clippy::result_large_err)]

use crate::core::error::TaskError;
use crate::core::types::ErrorCategory;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Uncompressed,
    Gzip,
    Bzip2,
    Zip,
}

impl Compression {
    /// Detect by extension. `.bgz` is gzip written by tabix-style indexers,
    /// kept under a distinct extension to avoid clashes on the backend.
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy();
        if name.ends_with(".gz") || name.ends_with(".bgz") {
            Compression::Gzip
        } else if name.ends_with(".bz2") {
            Compression::Bzip2
        } else if name.ends_with(".zip") {
            Compression::Zip
        } else {
            Compression::Uncompressed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Uncompressed => "uncompressed",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Zip => "zip",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single compression shared by a group of files. Mixed compressions in
/// one storage unit are an error.
pub fn uniform_compression(files: &[&Path]) -> Result<Compression, TaskError> {
    let mut detected: Option<Compression> = None;
    for file in files {
        let compression = Compression::from_path(file);
        match detected {
            None => detected = Some(compression),
            Some(existing) if existing != compression => {
                return Err(TaskError::new(
                    ErrorCategory::ValidationError,
                    format!(
                        "All files must have the same compression, detected {} and {}",
                        existing, compression
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    detected.ok_or_else(|| {
        TaskError::new(
            ErrorCategory::ValidationError,
            "Cannot detect compression of an empty file list",
        )
    })
}
