//! Line access for one log file.
//!
//! Forward-only and lazy: lines come off a buffered reader one at a time so
//! multi-hundred-megabyte setup logs never sit in memory whole. Each call to
//! [`LogLineReader::lines`] reopens the file, so a caller can restart from
//! the top.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Restartable line source for a single log file.
pub struct LogLineReader {
    path: PathBuf,
}

impl LogLineReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file and return a fresh line iterator over it.
    ///
    /// Items are `io::Result<String>` so a failure mid-file surfaces to the
    /// consumer instead of silently truncating the sequence.
    pub fn lines(&self) -> io::Result<Lines<BufReader<File>>> {
        let file = File::open(&self.path)?;
        Ok(BufReader::new(file).lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reads_lines_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "second").unwrap();

        let reader = LogLineReader::new(file.path());
        let lines: Vec<_> = reader.lines().unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_each_call_restarts_from_the_top() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "only").unwrap();

        let reader = LogLineReader::new(file.path());
        for _ in 0..2 {
            let lines: Vec<_> = reader.lines().unwrap().map(|l| l.unwrap()).collect();
            assert_eq!(lines, vec!["only"]);
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let reader = LogLineReader::new("/nonexistent/setupact.log");
        assert!(reader.lines().is_err());
    }
}
