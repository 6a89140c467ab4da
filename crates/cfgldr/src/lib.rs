//! # cfgldr
//!
//! Layered configuration files: sections, `@include`/`@inherit` of other
//! files, key write protection, `(!path)` references between values, and
//! verification against schema files written in the same language.
//!
//! ```text
//! # app.conf
//! @inherit(defaults.conf)
//! ~root = /srv/app
//! [server]
//! port = 8080
//! !data = (!:root)/data
//! ```
//!
//! Most callers only need [`load_config`], which returns the resolved
//! document as nested ordered maps of strings:
//!
//! ```rust,no_run
//! let config = cfgldr::load_config("app.conf", Some("app.schema".as_ref()))?;
//! let port = config["server"].as_map().and_then(|s| s["port"].as_text());
//! # Ok::<(), cfgldr::Error>(())
//! ```
//!
//! Use a [`Loader`] to make extra predicates available to schema rules, and
//! the underlying crates ([`cfgldr_parser`], [`cfgldr_verify`],
//! [`cfgldr_section`]) for finer control.

mod error;
mod loader;

use std::path::Path;

pub use error::{Error, Result};
pub use loader::Loader;

pub use cfgldr_parser::{Mode, ParseError, ParseOptions, parse_schema, parse_str};
pub use cfgldr_section::{KeyAttrs, Origin, PlainMap, PlainValue, Provenance, Section, Value};
pub use cfgldr_verify::{
    CompiledSchema, EvalValue, PredicateError, PredicateRegistry, VerificationError,
    VerificationErrorKind, verify,
};

/// Parse a configuration file.
pub fn parse(path: impl AsRef<Path>) -> Result<Section> {
    Loader::new().parse(path)
}

/// Parse a configuration file and verify it against a schema file.
pub fn parse_with_schema(path: impl AsRef<Path>, schema_path: impl AsRef<Path>) -> Result<Section> {
    Loader::new().parse_with_schema(path, schema_path)
}

/// Parse a configuration file, verify it when `schema_path` is given, and
/// return it as nested plain maps.
pub fn load_config(path: impl AsRef<Path>, schema_path: Option<&Path>) -> Result<PlainMap> {
    Loader::new().load(path, schema_path)
}
