use std::fs;
use std::io;
use std::path::Path;

use crate::error::NeidError;

/// Write through a temp file in the destination's directory so an
/// interrupted write never leaves a partial file at `path`.
pub fn write_reader_atomic<R: io::Read>(path: &Path, reader: &mut R) -> Result<(), NeidError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| NeidError::Filesystem(err.to_string()))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".neid-archive")
        .tempfile_in(parent)
        .map_err(|err| NeidError::Filesystem(err.to_string()))?;
    io::copy(reader, &mut temp).map_err(|err| NeidError::Filesystem(err.to_string()))?;

    if path.exists() {
        fs::remove_file(path).map_err(|err| NeidError::Filesystem(err.to_string()))?;
    }
    temp.persist(path)
        .map_err(|err| NeidError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<(), NeidError> {
    write_reader_atomic(path, &mut io::Cursor::new(content))
}
