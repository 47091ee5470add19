//! Chunked line I/O for the merge pipeline: a reverse reader that walks a
//! file tail-to-head without buffering it whole, and a forward reader for
//! consuming the per-type staging files and persisted chunks.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Reads a file from its last byte back to its first, one line at a time.
/// Wraps [`rev_lines::RevLines`] (the same crate the teacher reaches for to
/// tail its own log files) and strips a trailing `\r` so CRLF input reads
/// the same as LF input; blank physical lines are preserved as empty
/// strings rather than dropped, since this crate's line-counting invariants
/// treat a blank line as a real entry.
pub struct ReverseLineReader {
    inner: rev_lines::RevLines<File>,
}

impl ReverseLineReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let inner = rev_lines::RevLines::new(file);
        Ok(Self { inner })
    }

    /// Returns the next line (oldest-to-newest traversal order: tail first),
    /// with any trailing `\r` stripped, or `None` at beginning-of-file.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.inner.next() {
            Some(Ok(mut line)) => {
                if line.ends_with('\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Forward streaming line reader, used over per-type staging files and
/// persisted NDJSON chunks.
pub struct ForwardLineReader {
    lines: std::io::Lines<BufReader<File>>,
}

impl ForwardLineReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }

    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next().transpose()
    }

    pub fn next_lines(&mut self, n: usize) -> io::Result<Vec<String>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next_line()? {
                Some(line) => out.push(line),
                None => break,
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_reverse_reader_basic() {
        let f = write_file("a\nb\nc\n");
        let mut r = ReverseLineReader::open(f.path()).unwrap();
        assert_eq!(r.next_line().unwrap().as_deref(), Some("c"));
        assert_eq!(r.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(r.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn test_reverse_reader_no_trailing_newline() {
        let f = write_file("a\nb\nc");
        let mut r = ReverseLineReader::open(f.path()).unwrap();
        assert_eq!(r.next_line().unwrap().as_deref(), Some("c"));
        assert_eq!(r.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(r.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn test_reverse_reader_crlf() {
        let f = write_file("a\r\nb\r\n");
        let mut r = ReverseLineReader::open(f.path()).unwrap();
        assert_eq!(r.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(r.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn test_reverse_reader_handles_long_lines() {
        let long_line = "x".repeat(256 * 1024);
        let contents = format!("first\n{long_line}\nlast\n");
        let f = write_file(&contents);
        let mut r = ReverseLineReader::open(f.path()).unwrap();
        assert_eq!(r.next_line().unwrap().as_deref(), Some("last"));
        assert_eq!(r.next_line().unwrap().as_deref(), Some(long_line.as_str()));
        assert_eq!(r.next_line().unwrap().as_deref(), Some("first"));
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn test_reverse_reader_preserves_empty_lines() {
        let f = write_file("a\n\nb\n");
        let mut r = ReverseLineReader::open(f.path()).unwrap();
        assert_eq!(r.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(r.next_line().unwrap().as_deref(), Some(""));
        assert_eq!(r.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn test_reverse_reader_roundtrip_matches_forward_split() {
        let contents = "one\ntwo\nthree\nfour\n";
        let f = write_file(contents);
        let mut r = ReverseLineReader::open(f.path()).unwrap();
        let mut collected = Vec::new();
        while let Some(line) = r.next_line().unwrap() {
            collected.push(line);
        }
        collected.reverse();
        let expected: Vec<&str> = contents.lines().collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_forward_reader_next_lines() {
        let f = write_file("a\nb\nc\n");
        let mut r = ForwardLineReader::open(f.path()).unwrap();
        assert_eq!(r.next_lines(2).unwrap(), vec!["a", "b"]);
        assert_eq!(r.next_lines(2).unwrap(), vec!["c"]);
        assert_eq!(r.next_lines(2).unwrap(), Vec::<String>::new());
    }
}
