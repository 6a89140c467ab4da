//! Core types for source positions

use crate::utils::{line_text, offset_to_location};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A location in source text (0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Byte offset from start of source
    pub offset: usize,
    /// Row number (0-indexed)
    pub row: usize,
    /// Column number (0-indexed, in characters not bytes)
    pub column: usize,
}

/// A position inside a named file.
///
/// `location` is `None` when the position stands for a whole file, e.g. the
/// root section of a document or a file that could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePos {
    /// Path of the file, as it was opened
    pub file: PathBuf,
    /// Location inside the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// The full text of the line holding `location`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_text: Option<String>,
}

impl SourcePos {
    /// A position standing for the whole file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SourcePos {
            file: path.into(),
            location: None,
            line_text: None,
        }
    }

    /// A position at byte `offset` of `source`, which is the content of `path`.
    ///
    /// Offsets past the end of `source` are clamped to the end.
    pub fn in_source(path: impl Into<PathBuf>, source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let location = offset_to_location(source, offset);
        SourcePos {
            file: path.into(),
            location,
            line_text: location.map(|_| line_text(source, offset).to_string()),
        }
    }

    /// Path of the file this position points into.
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// 1-indexed line number, for display.
    pub fn line(&self) -> Option<usize> {
        self.location.map(|loc| loc.row + 1)
    }

    /// 1-indexed column number, for display.
    pub fn column(&self) -> Option<usize> {
        self.location.map(|loc| loc.column + 1)
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => {
                write!(
                    f,
                    "{} (line {}, column {})",
                    self.file.display(),
                    loc.row + 1,
                    loc.column + 1
                )?;
                if let Some(text) = &self.line_text {
                    write!(f, "\n\t{}", text)?;
                }
                Ok(())
            }
            None => write!(f, "{}", self.file.display()),
        }
    }
}
