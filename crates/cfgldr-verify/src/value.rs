//! Values manipulated by rule expressions.

use std::fmt;

use cfgldr_section::{PlainMap, PlainValue};

/// The result of evaluating a rule expression, or an argument to a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Map(PlainMap),
}

impl EvalValue {
    /// `None`, `False`, `0`, `""` and empty mappings are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            EvalValue::None => false,
            EvalValue::Bool(b) => *b,
            EvalValue::Int(i) => *i != 0,
            EvalValue::Str(s) => !s.is_empty(),
            EvalValue::Map(m) => !m.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EvalValue::None => "NoneType",
            EvalValue::Bool(_) => "bool",
            EvalValue::Int(_) => "int",
            EvalValue::Str(_) => "str",
            EvalValue::Map(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EvalValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for EvalValue {
    fn from(s: &str) -> Self {
        EvalValue::Str(s.to_string())
    }
}

impl From<String> for EvalValue {
    fn from(s: String) -> Self {
        EvalValue::Str(s)
    }
}

impl From<bool> for EvalValue {
    fn from(b: bool) -> Self {
        EvalValue::Bool(b)
    }
}

impl From<PlainValue> for EvalValue {
    fn from(v: PlainValue) -> Self {
        match v {
            PlainValue::Text(s) => EvalValue::Str(s),
            PlainValue::Map(m) => EvalValue::Map(m),
        }
    }
}

impl From<PlainMap> for EvalValue {
    fn from(m: PlainMap) -> Self {
        EvalValue::Map(m)
    }
}

impl fmt::Display for EvalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalValue::None => write!(f, "None"),
            EvalValue::Bool(true) => write!(f, "True"),
            EvalValue::Bool(false) => write!(f, "False"),
            EvalValue::Int(i) => write!(f, "{i}"),
            EvalValue::Str(s) => write!(f, "{s}"),
            EvalValue::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match v {
                        PlainValue::Text(s) => write!(f, "'{k}': '{s}'")?,
                        PlainValue::Map(_) => write!(f, "'{k}': {}", EvalValue::from(v.clone()))?,
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_truthiness() {
        assert!(!EvalValue::None.is_truthy());
        assert!(!EvalValue::Bool(false).is_truthy());
        assert!(!EvalValue::Int(0).is_truthy());
        assert!(!EvalValue::from("").is_truthy());
        assert!(!EvalValue::Map(PlainMap::new()).is_truthy());

        assert!(EvalValue::Bool(true).is_truthy());
        assert!(EvalValue::Int(-1).is_truthy());
        assert!(EvalValue::from("0").is_truthy());
    }

    #[test]
    fn test_display() {
        let mut inner = PlainMap::new();
        inner.insert("b".to_string(), PlainValue::Text("2".to_string()));
        let mut map = PlainMap::new();
        map.insert("a".to_string(), PlainValue::Text("1".to_string()));
        map.insert("s".to_string(), PlainValue::Map(inner));

        assert_snapshot!(EvalValue::Map(map).to_string(), @"{'a': '1', 's': {'b': '2'}}");
        assert_eq!(EvalValue::Bool(true).to_string(), "True");
    }
}
