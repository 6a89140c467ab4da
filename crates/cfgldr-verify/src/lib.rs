//! # cfgldr-verify
//!
//! Verification of configuration trees against schema documents.
//!
//! A schema is an ordinary cfgldr document parsed in schema mode. Each of
//! its keys is a rule: the key is a regular expression matched against
//! whole configuration key names, and the value is either a section of
//! rules (matching configuration sections) or a value rule expression
//! (matching scalars). A `^` prefix makes a rule mandatory.
//!
//! For each configuration key the first rule of the corresponding schema
//! section that matches both its name and its shape decides. Value rules
//! are small expressions over `VAL`, the value under verification, and
//! `CNF`, the section holding it:
//!
//! ```text
//! ^port  = re('[0-9]+') and VAL != '0'
//! mode   = VAL in 'strict lenient'
//! retry  = cond(CNF['mode'] == 'lenient', 'retry requires lenient mode')
//! [tls]
//! cert.* = re('.*[.]pem$')
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use cfgldr_parser::{parse_str, parse_str_with_options, ParseOptions};
//! use cfgldr_verify::{verify, PredicateRegistry};
//!
//! let schema = parse_str_with_options("^port = re('[0-9]+$')\n", "schema.conf", ParseOptions::schema()).unwrap();
//! let config = parse_str("port = 8080\n", "app.conf").unwrap();
//!
//! let registry = PredicateRegistry::new();
//! verify(&config, Path::new("app.conf"), &schema, Path::new("schema.conf"), &registry).unwrap();
//! ```

pub mod error;
mod expr;
pub mod predicates;
pub mod schema;
mod validator;
pub mod value;

pub use error::{KeyPath, VerificationError, VerificationErrorKind, VerificationResult};
pub use expr::Expression;
pub use predicates::{Predicate, PredicateError, PredicateRegistry};
pub use schema::{CompiledSchema, Rule, RuleBody, RuleSet};
pub use validator::verify;
pub use value::EvalValue;
