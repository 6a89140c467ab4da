//! Evaluation of `(!path)` references against a section tree.
//!
//! Deferred (`=`) values are evaluated once the whole document is known:
//! every template is resolved against the finished tree, chasing references
//! to other templates recursively, and the results are written back. Cycles
//! are caught with a stack of the key paths currently being evaluated.
//!
//! Immediate (`:=`) values are evaluated against the tree as it stands while
//! parsing, without chasing: a referenced key that still holds a template is
//! captured as a nested template and finished by the later pass.

use std::fmt;

use cfgldr_source_map::Provenance;
use thiserror::Error;
use tracing::{debug, trace};

use crate::section::{Section, Value};
use crate::template::{Fragment, Reference, Template};

const KEY_PATH_DELIMITER: &str = ":";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceErrorKind {
    /// A path segment names no key, or walks through a scalar
    Unresolved,
    /// The path ends at a section
    SectionReference,
    /// The key is already being evaluated further up
    Cycle,
}

impl fmt::Display for ReferenceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceErrorKind::Unresolved => write!(f, "Invalid key path"),
            ReferenceErrorKind::SectionReference => write!(f, "Section reference"),
            ReferenceErrorKind::Cycle => write!(f, "Recursive reference"),
        }
    }
}

/// A reference that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{kind}\n{provenance}\nReference path: {}\nReference key: {reference}",
    history.join(" -> ")
)]
pub struct ReferenceError {
    pub kind: ReferenceErrorKind,
    /// Path of the key whose value holds the reference
    pub key: Vec<String>,
    /// Definition history of that key; empty when it is not stored yet
    pub provenance: Provenance,
    /// Keys being evaluated when the error occurred, outermost first
    pub history: Vec<String>,
    /// The offending reference, resolved to an absolute path
    pub reference: String,
}

impl ReferenceError {
    pub fn key_path(&self) -> String {
        self.key.join(KEY_PATH_DELIMITER)
    }
}

struct Evaluator<'a> {
    root: &'a Section,
    recursive: bool,
    history: Vec<String>,
}

impl Evaluator<'_> {
    fn template(
        &mut self,
        key: &[String],
        template: &Template,
    ) -> Result<Value, ReferenceError> {
        let mut out = Vec::with_capacity(template.fragments().len());
        for fragment in template.fragments() {
            let value = match fragment {
                Fragment::Literal(s) => Value::Text(s.clone()),
                Fragment::Reference(r) => self.reference(key, r)?,
                Fragment::Nested(t) => self.template(key, t)?,
            };
            match value {
                Value::Text(s) => out.push(Fragment::Literal(s)),
                Value::Template(t) => out.push(Fragment::Nested(t)),
                // references to sections are rejected before getting here
                Value::Section(_) => {}
            }
        }
        Ok(Template::new(out).collapse())
    }

    fn reference(
        &mut self,
        key: &[String],
        reference: &Reference,
    ) -> Result<Value, ReferenceError> {
        let root = self.root;
        let key_str = key.join(KEY_PATH_DELIMITER);
        let target = reference.resolve(key);

        if self.recursive && self.history.contains(&key_str) {
            let mut history = self.history.clone();
            history.push(key_str);
            return Err(self.error(ReferenceErrorKind::Cycle, key, &target, history));
        }

        trace!(key = %key_str, reference = %reference, "resolving");
        self.history.push(key_str);
        let result = match root.lookup(&target) {
            None => Err(self.error(
                ReferenceErrorKind::Unresolved,
                key,
                &target,
                self.history.clone(),
            )),
            Some(Value::Section(_)) => Err(self.error(
                ReferenceErrorKind::SectionReference,
                key,
                &target,
                self.history.clone(),
            )),
            Some(Value::Text(s)) => Ok(Value::Text(s.clone())),
            Some(Value::Template(t)) if self.recursive => self.template(&target, t),
            Some(Value::Template(t)) => Ok(Value::Template(t.clone())),
        };
        self.history.pop();
        result
    }

    fn error(
        &self,
        kind: ReferenceErrorKind,
        key: &[String],
        target: &[String],
        history: Vec<String>,
    ) -> ReferenceError {
        ReferenceError {
            kind,
            key: key.to_vec(),
            provenance: self
                .root
                .lookup_attrs(key)
                .map(|a| a.provenance.clone())
                .unwrap_or_default(),
            history,
            reference: target.join(KEY_PATH_DELIMITER),
        }
    }
}

/// Evaluate every template in `root`, chasing references recursively.
///
/// Afterwards the tree holds no templates. Evaluating a tree that holds none
/// changes nothing.
pub fn evaluate_all(root: &mut Section) -> Result<(), ReferenceError> {
    let mut updates = Vec::new();
    collect_updates(root, root, &mut Vec::new(), &mut updates)?;
    debug!(count = updates.len(), "evaluated references");

    for (path, value) in updates {
        if let Some((key, parents)) = path.split_last()
            && let Some(section) = root.section_at_mut(parents)
        {
            section.replace_value(key, value);
        }
    }
    Ok(())
}

fn collect_updates(
    root: &Section,
    section: &Section,
    path: &mut Vec<String>,
    updates: &mut Vec<(Vec<String>, Value)>,
) -> Result<(), ReferenceError> {
    for (key, value) in section.iter() {
        path.push(key.to_string());
        match value {
            Value::Section(sub) => collect_updates(root, sub, path, updates)?,
            Value::Template(template) => {
                let mut evaluator = Evaluator {
                    root,
                    recursive: true,
                    history: Vec::new(),
                };
                let evaluated = evaluator.template(path, template)?;
                updates.push((path.clone(), evaluated));
            }
            Value::Text(_) => {}
        }
        path.pop();
    }
    Ok(())
}

/// Evaluate `template`, the value about to be stored at `key`, against the
/// tree as it currently is.
///
/// Referenced keys that still hold templates are not chased; they are
/// captured unevaluated, so the result may itself be a template. Relative
/// references inside a captured template are later resolved from the section
/// of `key`, not from the section the template was captured from.
pub fn evaluate_immediate(
    root: &Section,
    key: &[String],
    template: &Template,
) -> Result<Value, ReferenceError> {
    let mut evaluator = Evaluator {
        root,
        recursive: false,
        history: Vec::new(),
    };
    evaluator.template(key, template)
}
