//! Source positions and provenance for cfgldr
//!
//! Every key of a parsed document, and every error raised while parsing or
//! verifying one, carries the chain of positions that led to it: the position
//! inside the file that defined it, and the `@include`/`@inherit` lines of every
//! file on the way there.
//!
//! # Overview
//!
//! The core types are:
//! - [`Location`]: a 0-indexed position inside a source text
//! - [`SourcePos`]: a location inside a named file, with the text of its line
//! - [`Origin`]: an include back-trace plus the enclosing section path
//! - [`Provenance`]: the history of origins of a key, oldest first
//!
//! # Example
//!
//! ```rust
//! use cfgldr_source_map::*;
//!
//! let source = "[server]\nport = 80\n";
//! let pos = SourcePos::in_source("main.conf", source, 9);
//! assert_eq!(pos.line(), Some(2));
//! assert_eq!(pos.column(), Some(1));
//!
//! let origin = Origin::new(vec![pos], SectionPath::from(vec!["server".to_string()]));
//! assert_eq!(origin.section.to_string(), "> server");
//! ```

pub mod provenance;
pub mod types;
pub mod utils;

// Re-export main types
pub use provenance::{Origin, Provenance, SectionPath};
pub use types::{Location, SourcePos};
pub use utils::{line_text, offset_to_location};
