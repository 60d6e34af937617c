// LogSieve - platform/fs.rs
//
// File reading helpers shared by the pipeline and the field extractor.
//
// - Invalid UTF-8 is replaced (lossy) rather than failing the file; log
//   files from test equipment occasionally carry stray bytes.
// - Transient I/O errors (WouldBlock, Interrupted, TimedOut) are retried
//   with capped backoff. Permanent errors are returned immediately.
// - Files above LARGE_FILE_THRESHOLD are memory-mapped.
// - Report artifacts are written atomically (temp file, then rename) so a
//   failure never leaves a truncated report behind.

use crate::util::constants::{LARGE_FILE_THRESHOLD, MAX_READ_RETRIES, READ_RETRY_DELAYS_MS};
use std::io;
use std::path::Path;
use std::time::Duration;

/// Read a text file and split it into lines (`\n` or `\r\n`).
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let content = read_text(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Read the full content of a file as lossy UTF-8, retrying transient errors.
pub fn read_text(path: &Path) -> io::Result<String> {
    let mut last_err: Option<io::Error> = None;

    for attempt in 0..MAX_READ_RETRIES {
        match read_text_once(path) {
            Ok(content) => return Ok(content),
            Err(e) if is_transient_error(&e) => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error, retrying"
                );
                std::thread::sleep(Duration::from_millis(READ_RETRY_DELAYS_MS[attempt as usize]));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("Unknown read error")))
}

fn read_text_once(path: &Path) -> io::Result<String> {
    let size = std::fs::metadata(path)?.len();
    if size >= LARGE_FILE_THRESHOLD {
        read_large_file(path)
    } else {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Read using `memmap2` for large files (avoids allocating the raw buffer
/// in addition to the decoded string).
fn read_large_file(path: &Path) -> io::Result<String> {
    let file = std::fs::File::open(path)?;
    // SAFETY: the map is read-only and dropped before returning. External
    // modification of a log file while it is mapped could yield torn data,
    // which is acceptable for reading already-written log files.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    Ok(String::from_utf8_lossy(&mmap).into_owned())
}

/// Returns true for transient I/O errors that are worth retrying.
pub fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// Write `bytes` to `path` atomically: write a sibling temp file, then rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
