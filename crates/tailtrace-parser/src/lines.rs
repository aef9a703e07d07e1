use std::io::{self, BufRead};

/// Per-reader cap on a single logical line. One pathological entry must not
/// abort a whole session, so anything larger is consumed and dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024 * 1024;

/// Reads a byte stream one logical line at a time, tracking exactly how many
/// bytes were consumed (newline delimiters included) so a later call can
/// resume from `bytes_read()`.
///
/// A final line ending at EOF without a trailing newline counts one extra
/// byte: real session files always terminate lines with `\n`, so the next
/// appended record begins with exactly the byte this reader skipped.
pub struct LineReader<R> {
    inner: R,
    max_line_bytes: usize,
    bytes_read: u64,
    error: Option<io::Error>,
    done: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_line_bytes(inner, MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(inner: R, max_line_bytes: usize) -> Self {
        Self {
            inner,
            max_line_bytes,
            bytes_read: 0,
            error: None,
            done: false,
        }
    }

    /// Total bytes consumed so far, including newline delimiters of both
    /// delivered and skipped lines.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// The non-EOF I/O failure that stopped iteration, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    /// Take ownership of the recorded I/O failure.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Next logical line without its trailing newline. Empty and oversized
    /// lines are skipped silently; `None` means EOF or a recorded error.
    pub fn next_line(&mut self) -> Option<String> {
        while !self.done {
            let mut buf: Vec<u8> = Vec::new();
            let mut oversized = false;
            let mut consumed_any = false;

            loop {
                let available = match self.inner.fill_buf() {
                    Ok(chunk) => chunk,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.error = Some(e);
                        self.done = true;
                        return None;
                    }
                };

                if available.is_empty() {
                    self.done = true;
                    if !consumed_any {
                        return None;
                    }
                    // Missing final newline: the accepted one-byte overcount.
                    self.bytes_read += 1;
                    break;
                }

                let (take, ate_newline) = match available.iter().position(|&b| b == b'\n') {
                    Some(pos) => (pos + 1, true),
                    None => (available.len(), false),
                };

                consumed_any = true;
                if !oversized {
                    let text_end = if ate_newline { take - 1 } else { take };
                    if buf.len() + text_end > self.max_line_bytes {
                        oversized = true;
                        buf.clear();
                    } else {
                        buf.extend_from_slice(&available[..text_end]);
                    }
                }

                self.inner.consume(take);
                self.bytes_read += take as u64;

                if ate_newline {
                    break;
                }
            }

            if oversized {
                continue;
            }
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            let line = String::from_utf8_lossy(&buf).into_owned();
            if line.trim().is_empty() {
                continue;
            }
            return Some(line);
        }
        None
    }
}
