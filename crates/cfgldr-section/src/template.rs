//! Tokenizing of `(!path)` references inside values.
//!
//! A raw value is split into literal spans and references. `(!a:b)` refers to
//! key `b` of section `a` relative to the section holding the value being
//! evaluated; a leading `:` (as in `(!:a:b)`) makes the path absolute. An
//! opening `(!` directly preceded by another `(` is not a reference, and in
//! literal spans `((!` stands for a literal `(!`.

use std::fmt;
use thiserror::Error;

use crate::section::Value;

const OPEN: &str = "(!";
const ESCAPED_OPEN: &str = "((!";
const CLOSE: char = ')';
const PATH_DELIMITER: char = ':';

/// A parsed reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Resolved from the document root instead of the enclosing section
    pub absolute: bool,
    /// Key names, outermost first; never empty, no empty segment
    pub segments: Vec<String>,
}

impl Reference {
    /// Parse the text between `(!` and `)`.
    pub fn parse(path: &str) -> Result<Self, TemplateError> {
        let mut parts = path.split(PATH_DELIMITER).peekable();
        let absolute = parts.peek() == Some(&"");
        if absolute {
            parts.next();
        }
        let segments: Vec<String> = parts.map(str::to_string).collect();
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            return Err(TemplateError::EmptySegment {
                reference: path.to_string(),
            });
        }
        Ok(Reference { absolute, segments })
    }

    /// Resolve against the path of the key being evaluated.
    pub fn resolve(&self, key_path: &[String]) -> Vec<String> {
        if self.absolute {
            return self.segments.clone();
        }
        let parent = &key_path[..key_path.len().saturating_sub(1)];
        parent.iter().chain(self.segments.iter()).cloned().collect()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "{}", PATH_DELIMITER)?;
        }
        write!(f, "{}", self.segments.join(":"))
    }
}

/// One piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Literal(String),
    Reference(Reference),
    /// The unevaluated value of another key, captured by an immediate
    /// (`:=`) assignment
    Nested(Template),
}

/// A value that still holds unevaluated references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    fragments: Vec<Fragment>,
}

impl Template {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Template { fragments }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Tokenize a raw value.
    ///
    /// Values without references collapse to [`Value::Text`].
    pub fn parse(raw: &str) -> Result<Value, TemplateError> {
        let mut fragments = Vec::new();
        let mut literal_start = 0;
        let mut pos = 0;

        while let Some(found) = raw[pos..].find(OPEN) {
            let open = pos + found;
            let body_start = open + OPEN.len();
            let escaped = raw[..open].ends_with('(');
            let close = raw[body_start..].find(CLOSE).map(|i| body_start + i);

            match close {
                Some(close) if !escaped && close > body_start => {
                    push_literal(&mut fragments, &raw[literal_start..open]);
                    fragments.push(Fragment::Reference(Reference::parse(
                        &raw[body_start..close],
                    )?));
                    pos = close + CLOSE.len_utf8();
                    literal_start = pos;
                }
                _ => pos = open + 1,
            }
        }
        push_literal(&mut fragments, &raw[literal_start..]);

        Ok(Template::new(fragments).collapse())
    }

    /// Collapse to text when no references or nested templates remain.
    pub fn collapse(self) -> Value {
        if self
            .fragments
            .iter()
            .all(|f| matches!(f, Fragment::Literal(_)))
        {
            let text = self
                .fragments
                .into_iter()
                .filter_map(|f| match f {
                    Fragment::Literal(s) => Some(s),
                    _ => None,
                })
                .collect::<String>();
            Value::Text(text)
        } else {
            Value::Template(self)
        }
    }
}

fn push_literal(fragments: &mut Vec<Fragment>, span: &str) {
    if !span.is_empty() {
        fragments.push(Fragment::Literal(span.replace(ESCAPED_OPEN, OPEN)));
    }
}

/// Renders back to the source form, re-escaping literal `(!`.
impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(s) => write!(f, "{}", s.replace(OPEN, ESCAPED_OPEN))?,
                Fragment::Reference(r) => write!(f, "{}{}{}", OPEN, r, CLOSE)?,
                Fragment::Nested(t) => write!(f, "{}", t)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Invalid reference (!{reference}) : empty key in path")]
    EmptySegment { reference: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(path: &str) -> Fragment {
        Fragment::Reference(Reference::parse(path).unwrap())
    }

    fn literal(s: &str) -> Fragment {
        Fragment::Literal(s.to_string())
    }

    fn template(raw: &str) -> Template {
        match Template::parse(raw).unwrap() {
            Value::Template(t) => t,
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_collapses() {
        for raw in ["", "     ", "\n    \n", " 1234 562kdkd,\ne333\n44kk", "(!)", "(!a"] {
            assert_eq!(Template::parse(raw).unwrap(), Value::Text(raw.to_string()));
        }
    }

    #[test]
    fn test_escaped_open_is_literal() {
        assert_eq!(
            Template::parse("((!aa)((!bb)((!b)").unwrap(),
            Value::Text("(!aa)(!bb)(!b)".to_string())
        );
    }

    #[test]
    fn test_fragments() {
        let t = template("1(!a)22(!:x:aa)333");
        assert_eq!(
            t.fragments(),
            [literal("1"), reference("a"), literal("22"), reference(":x:aa"), literal("333")]
        );
    }

    #[test]
    fn test_reference_body_may_span_lines() {
        let t = template("(!aa bb)(!**\n**)");
        assert_eq!(t.fragments(), [reference("aa bb"), reference("**\n**")]);
    }

    #[test]
    fn test_reference_paths() {
        let rel = Reference::parse("a:b").unwrap();
        assert!(!rel.absolute);
        assert_eq!(rel.segments, ["a", "b"]);

        let abs = Reference::parse(":a").unwrap();
        assert!(abs.absolute);
        assert_eq!(abs.segments, ["a"]);

        for bad in [":", "a::b", "a:", "::"] {
            assert!(Reference::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_resolve_relative_to_parent_section() {
        let key_path = vec!["s".to_string(), "t".to_string(), "key".to_string()];
        let rel = Reference::parse("other").unwrap();
        assert_eq!(rel.resolve(&key_path), ["s", "t", "other"]);

        let abs = Reference::parse(":top").unwrap();
        assert_eq!(abs.resolve(&key_path), ["top"]);
    }

    #[test]
    fn test_empty_segment_is_an_error() {
        let err = Template::parse("x(!a::b)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid reference (!a::b) : empty key in path"
        );
    }

    #[test]
    fn test_display_round_trips_source_form() {
        let raw = "((!x) and (!:s:y)";
        assert_eq!(template(raw).to_string(), raw);
    }
}
