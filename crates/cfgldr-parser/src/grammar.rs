//! Line-oriented grammar of cfgldr documents.
//!
//! ```text
//! document := line ('\n' line)*
//! line     := ws* (comment | item ws* (ws comment)?)?
//! item     := section | command | assign
//! section  := '['+ ws* word ws* ']'+
//! command  := '@' name ws* '(' [^)]* ')'
//! assign   := ('^' | '!' | '~')? word ws* (':=' | '=') ws* value?
//! value    := '"""' .. '"""' | "'''" .. "'''" | '"' .. '"' | "'" .. "'" | unquoted
//! ```
//!
//! Items are tried in the order above, each on a copy of the scanner. The
//! grammar only recognizes items; what they mean is up to the session.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::options::Mode;
use crate::scanner::{Scanner, is_space};

static CONFIG_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+").unwrap());
static SCHEMA_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+").unwrap());

/// Attribute prefix of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyPrefix {
    /// `^`
    Mandatory,
    /// `!`
    Final,
    /// `~`
    Temporary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    /// `=`: evaluated once the whole document is parsed
    Deferred,
    /// `:=`: evaluated right away against what is parsed so far
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ItemKind<'a> {
    Section {
        opening: usize,
        closing: usize,
        name: &'a str,
    },
    Command {
        name: &'a str,
        argument: &'a str,
    },
    Assign {
        prefix: Option<KeyPrefix>,
        key: &'a str,
        op: AssignOp,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Item<'a> {
    /// Byte offset where the item starts
    pub offset: usize,
    pub kind: ItemKind<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

pub(crate) struct Grammar<'a> {
    scanner: Scanner<'a>,
    mode: Mode,
}

impl<'a> Grammar<'a> {
    pub fn new(source: &'a str, mode: Mode) -> Self {
        Grammar {
            scanner: Scanner::new(source),
            mode,
        }
    }

    /// The next item of the document, skipping blank and comment lines.
    pub fn next_item(&mut self) -> Result<Option<Item<'a>>, SyntaxError> {
        loop {
            let s = &mut self.scanner;
            s.skip_spaces();
            match s.peek() {
                None => return Ok(None),
                Some('\n') => {
                    s.bump();
                    continue;
                }
                Some('#') => {
                    s.skip_line();
                    continue;
                }
                Some(_) => {}
            }

            let offset = s.pos();
            let kind = self.item().ok_or_else(|| syntax_error(offset))?;

            let s = &mut self.scanner;
            let had_space = s.skip_spaces();
            if had_space && s.peek() == Some('#') {
                s.skip_line();
            }
            if !s.at_line_end() {
                return Err(syntax_error(s.pos()));
            }
            return Ok(Some(Item { offset, kind }));
        }
    }

    fn item(&mut self) -> Option<ItemKind<'a>> {
        let parsers: [fn(&Self, &mut Scanner<'a>) -> Option<ItemKind<'a>>; 3] =
            [Self::section, Self::command, Self::assign];
        for parse in parsers {
            let mut attempt = self.scanner;
            if let Some(kind) = parse(self, &mut attempt) {
                self.scanner = attempt;
                return Some(kind);
            }
        }
        None
    }

    fn word(&self, s: &mut Scanner<'a>) -> Option<&'a str> {
        match self.mode {
            Mode::Config => s.eat_regex(&CONFIG_WORD),
            Mode::Schema => s.eat_regex(&SCHEMA_WORD),
        }
    }

    fn section(&self, s: &mut Scanner<'a>) -> Option<ItemKind<'a>> {
        let opening = s.eat_while(|c| c == '[').len();
        if opening == 0 {
            return None;
        }
        s.skip_spaces();
        let name = self.word(s)?;
        let had_space = s.skip_spaces();
        let closing = s.eat_while(|c| c == ']').len();
        if closing > 0 {
            return Some(ItemKind::Section {
                opening,
                closing,
                name,
            });
        }

        // a schema word runs up to whitespace, so it may hold the closing brackets
        if self.mode == Mode::Schema && !had_space {
            let trimmed = name.trim_end_matches(']');
            if !trimmed.is_empty() && trimmed.len() < name.len() {
                return Some(ItemKind::Section {
                    opening,
                    closing: name.len() - trimmed.len(),
                    name: trimmed,
                });
            }
        }
        None
    }

    fn command(&self, s: &mut Scanner<'a>) -> Option<ItemKind<'a>> {
        if !s.eat_char('@') {
            return None;
        }
        let name = s.eat_regex(&CONFIG_WORD)?;
        s.skip_spaces();
        if !s.eat_char('(') {
            return None;
        }
        let body = s.rest();
        let end = body.find(')')?;
        s.advance(end + 1);
        Some(ItemKind::Command {
            name,
            argument: body[..end].trim(),
        })
    }

    fn assign(&self, s: &mut Scanner<'a>) -> Option<ItemKind<'a>> {
        let prefix = match s.peek() {
            Some('^') => Some(KeyPrefix::Mandatory),
            Some('!') => Some(KeyPrefix::Final),
            Some('~') => Some(KeyPrefix::Temporary),
            _ => None,
        };
        if prefix.is_some() {
            s.bump();
        }
        let key = self.word(s)?;
        let had_space = s.skip_spaces();
        if self.mode == Mode::Schema && !had_space {
            return None;
        }
        let op = if s.eat_str(":=") {
            AssignOp::Immediate
        } else if s.eat_char('=') {
            AssignOp::Deferred
        } else {
            return None;
        };
        let value = value(s);
        Some(ItemKind::Assign {
            prefix,
            key,
            op,
            value,
        })
    }
}

fn syntax_error(offset: usize) -> SyntaxError {
    SyntaxError {
        offset,
        message: "Syntax error".to_string(),
    }
}

/// Whether only whitespace and an optional comment remain on the line.
fn line_rest_is_blank(mut s: Scanner<'_>) -> bool {
    let had_space = s.skip_spaces();
    s.at_line_end() || (had_space && s.peek() == Some('#'))
}

fn value(s: &mut Scanner<'_>) -> String {
    s.skip_spaces();
    if s.peek() == Some('#') {
        s.skip_line();
        return String::new();
    }
    if s.at_line_end() {
        return String::new();
    }

    for (quote, multiline) in [("\"\"\"", true), ("'''", true), ("\"", false), ("'", false)] {
        let mut attempt = *s;
        if let Some(v) = quoted(&mut attempt, quote, multiline)
            && line_rest_is_blank(attempt)
        {
            *s = attempt;
            return v;
        }
    }
    unquoted(s)
}

fn quoted(s: &mut Scanner<'_>, quote: &str, multiline: bool) -> Option<String> {
    if !s.eat_str(quote) {
        return None;
    }
    let mut out = String::new();
    loop {
        if s.eat_str(quote) {
            return Some(out);
        }
        match s.bump()? {
            '\\' => out.push(match s.bump()? {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                c => c,
            }),
            '\n' if !multiline => return None,
            c => out.push(c),
        }
    }
}

/// Runs to the line end, or to whitespace that starts a comment.
fn unquoted(s: &mut Scanner<'_>) -> String {
    let start = s.pos();
    while let Some(c) = s.peek() {
        if c == '\n' {
            break;
        }
        if is_space(c) {
            let mut look = *s;
            look.skip_spaces();
            if look.peek() == Some('#') {
                break;
            }
        }
        s.bump();
    }
    s.slice(start, s.pos()).trim_end_matches(is_space).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(source: &str, mode: Mode) -> Result<Vec<Item<'_>>, SyntaxError> {
        let mut grammar = Grammar::new(source, mode);
        let mut out = Vec::new();
        while let Some(item) = grammar.next_item()? {
            out.push(item);
        }
        Ok(out)
    }

    fn kinds(source: &str) -> Vec<ItemKind<'_>> {
        items(source, Mode::Config)
            .unwrap()
            .into_iter()
            .map(|i| i.kind)
            .collect()
    }

    fn assign(key: &'static str, value: &str) -> ItemKind<'static> {
        ItemKind::Assign {
            prefix: None,
            key,
            op: AssignOp::Deferred,
            value: value.to_string(),
        }
    }

    fn value_of(line: &str) -> String {
        match kinds(line).pop() {
            Some(ItemKind::Assign { value, .. }) => value,
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert!(kinds("").is_empty());
        assert!(kinds("\n\n   \n\t# just a comment\n#another").is_empty());
    }

    #[test]
    fn test_assignments() {
        assert_eq!(
            kinds("a = 1\nb=2\n  c   =   three four  \n"),
            [assign("a", "1"), assign("b", "2"), assign("c", "three four")]
        );
    }

    #[test]
    fn test_empty_value() {
        assert_eq!(value_of("a ="), "");
        assert_eq!(value_of("a =   # nothing"), "");
        assert_eq!(value_of("a =# nothing"), "");
    }

    #[test]
    fn test_comment_needs_preceding_whitespace() {
        assert_eq!(value_of("a = b#c"), "b#c");
        assert_eq!(value_of("a = b #c"), "b");
        assert_eq!(value_of("a = b\t# c"), "b");
    }

    #[test]
    fn test_quoted_values() {
        assert_eq!(value_of(r#"a = "x # y""#), "x # y");
        assert_eq!(value_of("a = ' spaced '  # c"), " spaced ");
        assert_eq!(value_of(r#"a = "tab\there\nnl \"q\" \\""#), "tab\there\nnl \"q\" \\");
        assert_eq!(value_of(r#"a = """#), "");
    }

    #[test]
    fn test_triple_quoted_values_span_lines() {
        let source = "a = \"\"\"line 1\n  line 2\"\"\"  # done\nb = '''x\ny'''\n";
        assert_eq!(
            kinds(source),
            [assign("a", "line 1\n  line 2"), assign("b", "x\ny")]
        );
    }

    #[test]
    fn test_quotes_followed_by_text_are_unquoted() {
        assert_eq!(value_of(r#"a = "x" y"#), r#""x" y"#);
        assert_eq!(value_of(r#"a = "x"#), r#""x"#);
        assert_eq!(value_of("a = 'x"), "'x");
    }

    #[test]
    fn test_key_prefixes_and_operators() {
        let got = kinds("^m = 1\n!f := 2\n~t=3");
        assert_eq!(
            got,
            [
                ItemKind::Assign {
                    prefix: Some(KeyPrefix::Mandatory),
                    key: "m",
                    op: AssignOp::Deferred,
                    value: "1".to_string(),
                },
                ItemKind::Assign {
                    prefix: Some(KeyPrefix::Final),
                    key: "f",
                    op: AssignOp::Immediate,
                    value: "2".to_string(),
                },
                ItemKind::Assign {
                    prefix: Some(KeyPrefix::Temporary),
                    key: "t",
                    op: AssignOp::Deferred,
                    value: "3".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_sections() {
        assert_eq!(
            kinds("[a]\n[[ b.c ]]  # nested\n[x]]"),
            [
                ItemKind::Section {
                    opening: 1,
                    closing: 1,
                    name: "a"
                },
                ItemKind::Section {
                    opening: 2,
                    closing: 2,
                    name: "b.c"
                },
                ItemKind::Section {
                    opening: 1,
                    closing: 2,
                    name: "x"
                },
            ]
        );
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            kinds("@include(other.conf)\n@inherit ( base.conf )\n@include(multi\nline)"),
            [
                ItemKind::Command {
                    name: "include",
                    argument: "other.conf"
                },
                ItemKind::Command {
                    name: "inherit",
                    argument: "base.conf"
                },
                ItemKind::Command {
                    name: "include",
                    argument: "multi\nline"
                },
            ]
        );
    }

    #[test]
    fn test_syntax_errors() {
        let err = items("a = 1\n[a] trailing", Mode::Config).unwrap_err();
        assert_eq!(err.message, "Syntax error");
        assert_eq!(err.offset, 10);

        let err = items("ok = 1\n= no key", Mode::Config).unwrap_err();
        assert_eq!(err.offset, 7);

        assert!(items("[a]#c", Mode::Config).is_err());
        assert!(items("@include(x", Mode::Config).is_err());
        assert!(items("key value", Mode::Config).is_err());
        assert!(items("we$ird = 1", Mode::Config).is_err());
    }

    #[test]
    fn test_schema_words() {
        let got: Vec<_> = items("[ serv[0-9]+ ]\n[ab]\n^port.* = re('[0-9]+')", Mode::Schema)
            .unwrap()
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(
            got,
            [
                ItemKind::Section {
                    opening: 1,
                    closing: 1,
                    name: "serv[0-9]+"
                },
                ItemKind::Section {
                    opening: 1,
                    closing: 1,
                    name: "ab"
                },
                ItemKind::Assign {
                    prefix: Some(KeyPrefix::Mandatory),
                    key: "port.*",
                    op: AssignOp::Deferred,
                    value: "re('[0-9]+')".to_string(),
                },
            ]
        );

        // the operator must be separated from a schema word
        assert!(items("a= 1", Mode::Schema).is_err());
    }
}
