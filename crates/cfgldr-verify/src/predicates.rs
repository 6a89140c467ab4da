//! Named predicates callable from value rules.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::value::EvalValue;

/// Why a predicate did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// The value was rejected with a message, by `fail` or `cond`
    #[error("{0}")]
    Failed(String),
    /// The rule cannot be evaluated: bad arguments, bad regex, unknown name
    #[error("{0}")]
    Invalid(String),
}

/// A predicate receives the value under verification and its call arguments.
pub type Predicate =
    Arc<dyn Fn(&EvalValue, &[EvalValue]) -> Result<EvalValue, PredicateError> + Send + Sync>;

/// The functions value rules may call.
///
/// [`PredicateRegistry::new`] holds the built-ins:
///
/// - `re(pattern)`: whether `pattern` matches at the start of the value,
///   with `.` matching newlines
/// - `fail(message)`: reject the value
/// - `cond(condition, message)`: reject the value unless `condition` is truthy
///
/// Registering a predicate under an existing name replaces it.
#[derive(Clone)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Predicate>,
}

impl PredicateRegistry {
    /// A registry holding the built-in predicates.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("re", re);
        registry.register("fail", fail);
        registry.register("cond", cond);
        registry
    }

    pub fn empty() -> Self {
        PredicateRegistry {
            predicates: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&EvalValue, &[EvalValue]) -> Result<EvalValue, PredicateError> + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    /// Builder form of [`PredicateRegistry::register`].
    pub fn with<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&EvalValue, &[EvalValue]) -> Result<EvalValue, PredicateError> + Send + Sync + 'static,
    {
        self.register(name, predicate);
        self
    }

    /// Add every predicate of `other`, replacing ours on name clashes.
    pub fn extend(&mut self, other: &PredicateRegistry) {
        for (name, predicate) in &other.predicates {
            self.predicates.insert(name.clone(), Arc::clone(predicate));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.predicates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("predicates", &self.names())
            .finish()
    }
}

fn expect_args<'a, const N: usize>(
    name: &str,
    args: &'a [EvalValue],
) -> Result<&'a [EvalValue; N], PredicateError> {
    args.try_into().map_err(|_| {
        PredicateError::Invalid(format!(
            "{name}() takes {} argument{} ({} given)",
            N,
            if N == 1 { "" } else { "s" },
            args.len()
        ))
    })
}

fn re(val: &EvalValue, args: &[EvalValue]) -> Result<EvalValue, PredicateError> {
    let [pattern] = expect_args::<1>("re", args)?;
    let (Some(pattern), Some(val)) = (pattern.as_str(), val.as_str()) else {
        return Err(PredicateError::Invalid(
            "re() matches a string against a string pattern".to_string(),
        ));
    };
    let regex = Regex::new(&format!("(?s)^(?:{pattern})"))
        .map_err(|e| PredicateError::Invalid(format!("bad pattern '{pattern}': {e}")))?;
    Ok(EvalValue::Bool(regex.is_match(val)))
}

fn fail(_val: &EvalValue, args: &[EvalValue]) -> Result<EvalValue, PredicateError> {
    let [message] = expect_args::<1>("fail", args)?;
    Err(PredicateError::Failed(message.to_string()))
}

fn cond(_val: &EvalValue, args: &[EvalValue]) -> Result<EvalValue, PredicateError> {
    let [condition, message] = expect_args::<2>("cond", args)?;
    if condition.is_truthy() {
        Ok(EvalValue::Bool(true))
    } else {
        Err(PredicateError::Failed(message.to_string()))
    }
}
