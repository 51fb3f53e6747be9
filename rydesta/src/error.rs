//! The top-level error both the reader and the evaluator funnel into
//! (§4.4, §6, §7): `<filename>:<line>:\n  <kind>: <reason>`. A hand-written
//! `Display`, not a derive, following `passerine::compiler::syntax::Syntax`
//! -- simplified since Rydesta errors carry a line, not a byte-range span.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::eval::error::RuntimeError;
use crate::reader::ReaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Reader,
    Runtime,
}

impl ErrorKind {
    fn label(self) -> &'static str {
        match self {
            ErrorKind::Reader => "reader error",
            ErrorKind::Runtime => "runtime error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RydestaError {
    pub filename: PathBuf,
    pub line: usize,
    pub kind: ErrorKind,
    pub reason: String,
}

impl RydestaError {
    pub fn reader(filename: &Path, error: ReaderError) -> RydestaError {
        RydestaError {
            filename: filename.to_path_buf(),
            line: error.line,
            kind: ErrorKind::Reader,
            reason: error.reason,
        }
    }

    pub fn runtime(filename: &Path, error: RuntimeError) -> RydestaError {
        RydestaError {
            filename: filename.to_path_buf(),
            line: error.line,
            kind: ErrorKind::Runtime,
            reason: error.reason,
        }
    }

    pub fn runtime_at(filename: &Path, line: usize, reason: impl Into<String>) -> RydestaError {
        RydestaError {
            filename: filename.to_path_buf(),
            line,
            kind: ErrorKind::Runtime,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RydestaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:\n  {}: {}",
            self.filename.display(),
            self.line,
            self.kind.label(),
            self.reason
        )
    }
}

impl std::error::Error for RydestaError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_matches_the_external_contract() {
        let err = RydestaError::runtime_at(Path::new("a.ry"), 3, "\"x\" is not defined");
        assert_eq!(err.to_string(), "a.ry:3:\n  runtime error: \"x\" is not defined");
    }
}
