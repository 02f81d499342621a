//! I/O utilities for checkpoint files.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::StoreError;

/// Classifies I/O errors into specific StoreError variants.
pub fn classify_io_error(error: std::io::Error, context: &str) -> StoreError {
    match error.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            StoreError::TransientIoError(format!("{}: {}", context, error))
        }
        _ => StoreError::IoError(format!("{}: {}", context, error)),
    }
}

/// Retries an operation that may fail with transient I/O errors.
pub fn retry_io_operation<F, T>(
    operation: F,
    max_retries: u32,
    retry_delay_ms: u64,
    context: &str,
) -> Result<T, StoreError>
where
    F: Fn() -> Result<T, StoreError>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(err);
                }

                // Only retry transient I/O errors
                if let StoreError::TransientIoError(_) = err {
                    tracing::warn!(
                        "Transient I/O error in {} (attempt {}/{}): {}",
                        context,
                        attempt,
                        max_retries,
                        err
                    );
                    if retry_delay_ms > 0 {
                        std::thread::sleep(std::time::Duration::from_millis(retry_delay_ms));
                    }
                    continue;
                }

                return Err(err);
            }
        }
    }
}

/// Writes `contents` to `dir/name` through a synced temporary file and a
/// rename, so readers see either the old or the new file.
pub(crate) fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|e| classify_io_error(e, "Failed to create data directory"))?;

    let temp_path = dir.join(format!("{}.tmp", name));
    let final_path = dir.join(name);

    let mut file =
        File::create(&temp_path).map_err(|e| classify_io_error(e, "Failed to create temp file"))?;
    file.write_all(contents)
        .map_err(|e| classify_io_error(e, "Failed to write temp file"))?;
    file.sync_all()
        .map_err(|e| classify_io_error(e, "Failed to sync temp file"))?;

    fs::rename(&temp_path, &final_path)
        .map_err(|e| classify_io_error(e, &format!("Failed to rename {}", name)))?;
    Ok(())
}
