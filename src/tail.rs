//! Backward, chunked reading of the last lines of a file.
//!
//! Only as many trailing chunks as needed to cover the requested lines are
//! read, so tailing a multi-megabyte journal touches a few KiB.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

pub const DEFAULT_TAIL_BUFFER: usize = 4096;

/// Placeholder returned by [`tail_or_placeholder`] when the file cannot be
/// opened. Callers must treat it as "no data".
pub const TAIL_UNAVAILABLE: &str = "Unable to open the log file.";

/// Return the last `max_lines` lines of `path`, newline-joined, without a
/// trailing empty line. Asking for zero lines yields an empty string.
///
/// Chunks of `buffer_size` bytes are read from the end until either the
/// start of the file is reached or more than `max_lines` newlines have been
/// collected.
pub fn tail_file(path: &Path, max_lines: usize, buffer_size: usize) -> io::Result<String> {
    let mut file = File::open(path)?;
    let buffer_size = buffer_size.max(1) as u64;

    let mut position = file.seek(SeekFrom::End(0))?;
    let mut data: Vec<u8> = Vec::new();
    let mut newlines = 0usize;

    while position > 0 && newlines <= max_lines {
        let read_size = buffer_size.min(position);
        position -= read_size;
        file.seek(SeekFrom::Start(position))?;

        let mut chunk = vec![0u8; read_size as usize];
        file.read_exact(&mut chunk)?;
        newlines += chunk.iter().filter(|&&b| b == b'\n').count();

        chunk.extend_from_slice(&data);
        data = chunk;
    }

    Ok(last_lines(&data, max_lines))
}

/// [`tail_file`] with failures turned into [`TAIL_UNAVAILABLE`].
pub fn tail_or_placeholder(path: &Path, max_lines: usize, buffer_size: usize) -> String {
    tail_file(path, max_lines, buffer_size).unwrap_or_else(|err| {
        tracing::debug!(path = %path.display(), error = %err, "tail failed");
        TAIL_UNAVAILABLE.to_string()
    })
}

fn last_lines(data: &[u8], max_lines: usize) -> String {
    if max_lines == 0 {
        return String::new();
    }

    let mut end = data.len();
    while end > 0 && data[end - 1] == b'\n' {
        end -= 1;
    }
    let trimmed = &data[..end];

    // Walk back over `max_lines - 1` newlines; the slice after the next one
    // holds exactly the requested lines.
    let mut start = 0;
    let mut seen = 0;
    for (idx, &byte) in trimmed.iter().enumerate().rev() {
        if byte == b'\n' {
            seen += 1;
            if seen == max_lines {
                start = idx + 1;
                break;
            }
        }
    }

    String::from_utf8_lossy(&trimmed[start..]).into_owned()
}
