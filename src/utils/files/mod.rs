#![allow(clippy::result_large_err)]

//! Filesystem helpers for staging inputs and producing outputs inside the
//! task directory.

use crate::core::error::TaskError;
use crate::core::types::ErrorCategory;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Remove a file, symlink, or directory tree. Missing paths are fine.
pub fn remove_path(path: &Path) -> Result<(), TaskError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Size in bytes of a file, or the summed size of a directory tree.
pub fn path_size(path: &Path) -> Result<u64, TaskError> {
    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        total += path_size(&entry?.path())?;
    }
    Ok(total)
}

/// Return `output` unchanged if nothing sits there yet, otherwise a fresh
/// unique name in the same directory (keeping the original base name as a
/// suffix, so outputs stay recognizable).
pub fn unique_output_name(output: &Path) -> Result<PathBuf, TaskError> {
    if !output.exists() {
        return Ok(output.to_path_buf());
    }
    let directory = output.parent().unwrap_or_else(|| Path::new("."));
    let base_name = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            TaskError::new(
                ErrorCategory::ValidationError,
                format!("Output path has no file name: {}", output.display()),
            )
        })?;
    let file = tempfile::Builder::new()
        .prefix("")
        .suffix(&format!("_{base_name}"))
        .tempfile_in(directory)?;
    let (_, path) = file.keep().map_err(|err| {
        TaskError::new(
            ErrorCategory::IoError,
            format!("failed to keep unique output file: {err}"),
        )
    })?;
    Ok(path)
}

/// Concatenate files into `output`, like `cat paths... > output`. Written
/// through a temporary file in the target directory so a crash never leaves
/// a half-written output behind.
pub fn concatenate_files(paths: &[&Path], output: &Path) -> Result<(), TaskError> {
    let directory = output.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(directory)?;
    for path in paths {
        let mut source = fs::File::open(path)?;
        std::io::copy(&mut source, temp.as_file_mut())?;
    }
    temp.persist(output).map_err(|err| {
        TaskError::new(
            ErrorCategory::IoError,
            format!("failed to move concatenated file into place: {err}"),
        )
    })?;
    Ok(())
}

/// SHA-256 over the contents of files and directory trees. Directories are
/// traversed in sorted order so the digest is stable across platforms.
pub fn sha256_digest(paths: &[&Path]) -> Result<String, TaskError> {
    let mut hasher = Sha256::new();
    for path in paths {
        digest_path(&mut hasher, path)?;
    }
    Ok(hex::encode(hasher.finalize()))
}

fn digest_path(hasher: &mut Sha256, path: &Path) -> Result<(), TaskError> {
    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return digest_file(hasher, path);
    }
    let mut entries: Vec<_> = fs::read_dir(path)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    for entry in entries {
        digest_path(hasher, &entry)?;
    }
    Ok(())
}

fn digest_file(hasher: &mut Sha256, path: &Path) -> Result<(), TaskError> {
    let mut file = fs::File::open(path)?;
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(())
}

/// True when a file holds no data. Gzip members always have a non-zero
/// on-disk size, so for `.gz`/`.bgz` the uncompressed length is taken from
/// the gzip ISIZE trailer instead of the file size.
pub fn is_empty_file(path: &Path) -> Result<bool, TaskError> {
    let size = fs::metadata(path)?.len();
    if size == 0 {
        return Ok(true);
    }
    if crate::utils::compression::Compression::from_path(path)
        != crate::utils::compression::Compression::Gzip
    {
        return Ok(false);
    }
    // Trailer of the last member: CRC32 then ISIZE, both little-endian.
    if size < 8 {
        return Ok(true);
    }
    let mut file = fs::File::open(path)?;
    use std::io::Seek;
    file.seek(std::io::SeekFrom::End(-4))?;
    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer)?;
    Ok(u32::from_le_bytes(trailer) == 0)
}
