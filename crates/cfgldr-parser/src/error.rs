//! Errors raised while parsing a document.

use std::path::{Path, PathBuf};

use cfgldr_section::{ReferenceError, SectionError};
use cfgldr_source_map::Origin;
use thiserror::Error;

/// Result type alias for cfgldr-parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// A failed parse. Every variant renders the include back-trace of the
/// position it refers to.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Malformed text, or a well-formed item that makes no sense here
    #[error("{message}\n{origin}")]
    Syntax { message: String, origin: Origin },

    /// A document or include target could not be opened or read
    #[error("Fail to access config file : {} ({message})\n{origin}", path.display())]
    FileAccess {
        path: PathBuf,
        message: String,
        origin: Origin,
    },

    /// A file includes itself, directly or through other files
    #[error("Cyclic(Recursive) parsing is detected : {}\n{origin}", path.display())]
    CyclicInclude { path: PathBuf, origin: Origin },

    /// Overwriting a protected key, by assignment or through a merge
    #[error("{error}\n{origin}")]
    WriteProtection {
        #[source]
        error: SectionError,
        origin: Origin,
    },

    /// A value reference that cannot be evaluated
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>, origin: Origin) -> Self {
        ParseError::Syntax {
            message: message.into(),
            origin,
        }
    }

    pub(crate) fn file_access(path: &Path, error: &std::io::Error, origin: Origin) -> Self {
        ParseError::FileAccess {
            path: path.to_path_buf(),
            message: error.to_string(),
            origin,
        }
    }

    /// True when a file could not be read, as opposed to having bad content.
    pub fn is_file_access(&self) -> bool {
        matches!(self, ParseError::FileAccess { .. })
    }

    pub fn is_cyclic_include(&self) -> bool {
        matches!(self, ParseError::CyclicInclude { .. })
    }

    pub fn is_write_protection(&self) -> bool {
        matches!(self, ParseError::WriteProtection { .. })
    }

    /// Where the error happened. Reference errors carry the definition
    /// history of the offending key instead; this returns its latest entry.
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            ParseError::Syntax { origin, .. }
            | ParseError::FileAccess { origin, .. }
            | ParseError::CyclicInclude { origin, .. }
            | ParseError::WriteProtection { origin, .. } => Some(origin),
            ParseError::Reference(e) => e.provenance.latest(),
        }
    }
}
