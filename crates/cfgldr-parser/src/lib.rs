//! # cfgldr-parser
//!
//! Parsing of cfgldr documents into [`Section`] trees.
//!
//! A document is a sequence of lines, each holding at most one item:
//!
//! ```text
//! # comment
//! [server]                 # open a section at depth 1
//! port = 8080              # deferred assignment
//! [[tls]]                  # open a section at depth 2
//! !cert = (!:base)/c.pem   # final key with an absolute reference
//! @include(common.conf)    # merge another document here, read-only
//! @inherit(defaults.conf)  # merge another document here, overridable
//! ```
//!
//! Parsing a top-level document follows every include, evaluates all
//! `(!path)` references once the tree is complete, and finally drops the
//! keys marked temporary with `~`.
//!
//! ## Example
//!
//! ```rust
//! use cfgldr_parser::parse_str;
//!
//! let root = parse_str("~base = /srv\n[app]\nroot = (!:base)/app\n", "app.conf").unwrap();
//! let app = root.get_section("app").unwrap();
//! assert_eq!(app.get_text("root"), Some("/srv/app"));
//! assert!(!root.contains_key("base"));
//! ```

mod error;
mod grammar;
mod options;
mod scanner;
mod session;

use std::path::Path;

use cfgldr_section::Section;

pub use error::{ParseError, Result};
pub use options::{Mode, ParseOptions};
pub use session::ParserSession;

/// Parse the configuration document at `path`.
///
/// # Errors
///
/// Returns [`ParseError::FileAccess`] when `path` or one of its includes
/// cannot be read, and the other variants for bad content.
pub fn parse(path: impl AsRef<Path>) -> Result<Section> {
    parse_with_options(path, ParseOptions::config())
}

/// Parse the schema document at `path`, whose key names are regular expressions.
pub fn parse_schema(path: impl AsRef<Path>) -> Result<Section> {
    parse_with_options(path, ParseOptions::schema())
}

pub fn parse_with_options(path: impl AsRef<Path>, options: ParseOptions) -> Result<Section> {
    ParserSession::new(options).parse_file(path)
}

/// Parse a configuration document held in memory.
///
/// `path` is only used in diagnostics and to resolve relative includes.
pub fn parse_str(text: &str, path: impl AsRef<Path>) -> Result<Section> {
    parse_str_with_options(text, path, ParseOptions::config())
}

pub fn parse_str_with_options(
    text: &str,
    path: impl AsRef<Path>,
    options: ParseOptions,
) -> Result<Section> {
    ParserSession::new(options).parse_str(text, path)
}
