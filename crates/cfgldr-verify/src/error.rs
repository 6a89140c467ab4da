// Error types for schema verification

use cfgldr_section::Provenance;
use std::fmt;
use thiserror::Error;

/// Result type for verification operations
pub type VerificationResult<T> = Result<T, VerificationError>;

/// Structured verification error kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationErrorKind {
    /// No rule of the schema section matches a configuration key
    NoRuleFound,

    /// A mandatory rule matched no key of the configuration section
    MissingMandatoryKey,

    /// The value rule evaluated to a false value
    RuleFailed,

    /// The value rule rejected the value with a message (`fail`, `cond`)
    PredicateFailed { message: String },

    /// The rule could not be compiled or evaluated
    PredicateError { message: String },
}

impl VerificationErrorKind {
    /// Format a human-readable message from this error kind
    pub fn message(&self) -> String {
        match self {
            VerificationErrorKind::NoRuleFound => "No-rule found".to_string(),
            VerificationErrorKind::MissingMandatoryKey => "Missing mandatory key".to_string(),
            VerificationErrorKind::RuleFailed => "Rule-verification fails".to_string(),
            VerificationErrorKind::PredicateFailed { message } => {
                format!("Verification fails : {}", message)
            }
            VerificationErrorKind::PredicateError { message } => {
                format!("Verifier function exception: {}", message)
            }
        }
    }
}

/// A failed verification, pointing at both the configuration key and the
/// schema rule involved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct VerificationError {
    /// The structured error kind
    pub kind: VerificationErrorKind,
    /// Configuration key, or the configuration section for missing keys
    pub config_key: KeyPath,
    /// Definition history of `config_key`
    pub config_provenance: Provenance,
    /// Schema rule, or the schema section when no rule matched
    pub rule_key: KeyPath,
    /// Definition history of `rule_key`
    pub rule_provenance: Provenance,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind.message())?;
        writeln!(f, "< Config >")?;
        writeln!(f, "Issued key: {}", self.config_key)?;
        writeln!(f, "{}", self.config_provenance)?;
        writeln!(f, "{}", "*".repeat(69))?;
        writeln!(f, "< Verifier >")?;
        writeln!(f, "Issued keyrule: {}", self.rule_key)?;
        write!(f, "{}", self.rule_provenance)
    }
}

impl VerificationError {
    /// Create a new verification error with a structured kind
    pub fn new(kind: VerificationErrorKind) -> Self {
        Self {
            kind,
            config_key: KeyPath::new(),
            config_provenance: Provenance::new(),
            rule_key: KeyPath::new(),
            rule_provenance: Provenance::new(),
        }
    }

    /// Get the human-readable message for this error
    pub fn message(&self) -> String {
        self.kind.message()
    }

    /// Set the configuration side of this error
    pub fn with_config(mut self, key: KeyPath, provenance: &Provenance) -> Self {
        self.config_key = key;
        self.config_provenance = provenance.clone();
        self
    }

    /// Set the schema side of this error
    pub fn with_rule(mut self, key: KeyPath, provenance: &Provenance) -> Self {
        self.rule_key = key;
        self.rule_provenance = provenance.clone();
        self
    }
}

/// Path of a key from the document root (e.g., ["server", "tls", "cert"])
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Create a new empty path (the document root)
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Push a key onto the path
    pub fn push(&mut self, key: impl Into<String>) {
        self.segments.push(key.into());
    }

    /// Pop the last key from the path
    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// A copy of this path extended by `key`
    pub fn join(&self, key: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(key);
        path
    }

    /// Get the segments as a slice
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if the path is the root
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the length of the path
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", self.segments.join(":"))
        }
    }
}
