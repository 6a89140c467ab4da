//! Section trees for cfgldr documents.
//!
//! A parsed document is a tree of [`Section`]s. Every key carries a
//! [`KeyAttrs`] record with its write-protection flags and the history of
//! where it was defined.
//!
//! # Write protection
//!
//! A key is protected when it is `finalized` (`!key`); otherwise it is
//! unprotected when `temporary` (`~key`); otherwise it is protected unless it
//! was made `writable`, which only `@inherit` does. Every write clears all
//! flags again, so a key may be overwritten at most once per grant.
//!
//! # References
//!
//! Values may embed `(!path)` references to other keys. They are tokenized
//! into a [`Template`] when the value is parsed and resolved by
//! [`evaluate_all`] once the document is complete.
//!
//! ```rust
//! use cfgldr_section::{Section, Template, evaluate_all};
//!
//! let mut root = Section::root();
//! root.set("host", "example.org").unwrap();
//! root.set("url", Template::parse("https://(!host)/").unwrap()).unwrap();
//! evaluate_all(&mut root).unwrap();
//!
//! assert_eq!(root.get_text("url"), Some("https://example.org/"));
//! ```

mod eval;
mod merge;
mod ordered;
mod plain;
mod section;
mod template;

pub use eval::{ReferenceError, ReferenceErrorKind, evaluate_all, evaluate_immediate};

pub use ordered::OrderedMap;

pub use plain::{PlainMap, PlainValue};

pub use section::{Entry, KeyAttrs, Section, SectionError, Value};

pub use template::{Fragment, Reference, Template, TemplateError};

// Re-export for convenience
pub use cfgldr_source_map::{Origin, Provenance};
