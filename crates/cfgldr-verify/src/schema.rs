//! Schema documents compiled into ordered rule sets.
//!
//! Every key of a schema section is a rule: the key text is a regular
//! expression over configuration key names (matched against the whole name),
//! and the value is either a nested section of rules or a value rule
//! expression. Rules are kept in document order, which is their priority.

use std::path::Path;

use cfgldr_section::{Origin, Provenance, Section, Value};
use regex::Regex;
use tracing::debug;

use crate::error::{KeyPath, VerificationError, VerificationErrorKind, VerificationResult};
use crate::expr::Expression;

/// A schema document ready to verify configurations against.
///
/// Compiling once and calling [`CompiledSchema::verify`] repeatedly avoids
/// recompiling patterns and expressions for every configuration.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    root: RuleSet,
}

/// The rules of one schema section.
#[derive(Debug, Clone)]
pub struct RuleSet {
    path: KeyPath,
    provenance: Provenance,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    path: KeyPath,
    pattern: Regex,
    mandatory: bool,
    body: RuleBody,
    provenance: Provenance,
}

#[derive(Debug, Clone)]
pub enum RuleBody {
    /// Matches configuration sections, whose keys are checked against these rules
    Section(RuleSet),
    /// Matches scalar values for which the expression is truthy
    Value(Expression),
}

impl CompiledSchema {
    /// Compile the root section of a parsed schema document read from `schema_path`.
    ///
    /// # Errors
    ///
    /// A key that is not a valid regular expression, or a value that is not a
    /// valid expression, fails with [`VerificationErrorKind::PredicateError`].
    pub fn compile(schema: &Section, schema_path: &Path) -> VerificationResult<Self> {
        let provenance = Provenance::from(Origin::file(schema_path));
        let root = RuleSet::compile(schema, KeyPath::new(), provenance)?;
        debug!(schema = %schema_path.display(), rules = root.len(), "compiled schema");
        Ok(CompiledSchema { root })
    }

    pub fn root(&self) -> &RuleSet {
        &self.root
    }
}

impl RuleSet {
    fn compile(section: &Section, path: KeyPath, provenance: Provenance) -> VerificationResult<Self> {
        let mut rules = Vec::with_capacity(section.len());
        for (key, entry) in section.entries() {
            let rule_path = path.join(key.as_str());
            let fail = |message: String| {
                VerificationError::new(VerificationErrorKind::PredicateError { message })
                    .with_rule(rule_path.clone(), &entry.attrs.provenance)
            };

            let pattern = Regex::new(&format!("^(?:{key})$"))
                .map_err(|e| fail(format!("bad key rule '{key}': {e}")))?;
            let body = match &entry.value {
                Value::Section(sub) => RuleBody::Section(RuleSet::compile(
                    sub,
                    rule_path.clone(),
                    entry.attrs.provenance.clone(),
                )?),
                Value::Text(source) => RuleBody::Value(
                    Expression::compile(source).map_err(|e| fail(e.to_string()))?,
                ),
                Value::Template(template) => RuleBody::Value(
                    Expression::compile(&template.to_string()).map_err(|e| fail(e.to_string()))?,
                ),
            };

            rules.push(Rule {
                path: rule_path,
                pattern,
                mandatory: entry.attrs.mandatory,
                body,
                provenance: entry.attrs.provenance.clone(),
            });
        }
        Ok(RuleSet {
            path,
            provenance,
            rules,
        })
    }

    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule matching both the name and the shape of a configuration entry.
    pub fn find(&self, key: &str, value: &Value) -> Option<(usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(key, value))
    }
}

impl Rule {
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// The key rule as written in the schema.
    pub fn key(&self) -> &str {
        self.path.segments().last().map_or("", String::as_str)
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn body(&self) -> &RuleBody {
        &self.body
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Whether the rule applies to `key`. A section rule only applies to
    /// sections and a value rule only to scalars.
    pub fn matches(&self, key: &str, value: &Value) -> bool {
        self.pattern.is_match(key) && matches!(self.body, RuleBody::Section(_)) == value.is_section()
    }
}
