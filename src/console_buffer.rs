//! Bounded in-memory buffer for captured server output.
//!
//! One writer (the output-draining task) and one reader (the UI log viewer)
//! share it through a mutex. The cap keeps memory bounded regardless of how
//! long the server runs; the most recent lines are always retained.

use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Eviction triggers above this many lines...
const MAX_LINES: usize = 10_000;
/// ...and trims back down to this many, so eviction is amortized.
const TRIM_TO: usize = 8_000;

pub static CONSOLE: Lazy<ConsoleBuffer> = Lazy::new(ConsoleBuffer::new);

pub struct ConsoleBuffer {
    lines: Mutex<VecDeque<String>>,
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
        }
    }

    fn lock_lines(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        if line.is_empty() {
            return;
        }
        let mut lines = self.lock_lines();
        lines.push_back(line);
        if lines.len() > MAX_LINES {
            let excess = lines.len() - TRIM_TO;
            lines.drain(..excess);
        }
    }

    pub fn clear(&self) {
        self.lock_lines().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_lines().is_empty()
    }

    /// Snapshot of the buffered output, newline-joined.
    pub fn contents(&self) -> String {
        let lines = self.lock_lines();
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_contents() {
        let buf = ConsoleBuffer::new();
        buf.push("hello");
        buf.push("");
        buf.push("world");
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.contents(), "hello\nworld\n");
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bounded_with_newest_retained() {
        let buf = ConsoleBuffer::new();
        for i in 0..(MAX_LINES + 500) {
            buf.push(format!("line {i}"));
        }
        assert!(buf.len() <= MAX_LINES);
        assert_eq!(buf.len(), TRIM_TO + 500 - 1);
        // oldest evicted first, newest retained
        let contents = buf.contents();
        assert!(!contents.contains("line 0\n"));
        assert!(contents.ends_with(&format!("line {}\n", MAX_LINES + 499)));
    }
}
