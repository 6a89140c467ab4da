//! Value-rule expressions.
//!
//! The value of a scalar schema rule is an expression over two bindings,
//! `VAL` (the configuration value being checked) and `CNF` (the enclosing
//! configuration section as a mapping), and the predicates of a
//! [`PredicateRegistry`]:
//!
//! ```text
//! expr     := or
//! or       := and ('or' and)*
//! and      := not ('and' not)*
//! not      := 'not' not | compare
//! compare  := postfix (cmp_op postfix)*
//! cmp_op   := '==' | '!=' | '<' | '<=' | '>' | '>=' | 'in' | 'not' 'in'
//! postfix  := primary ('(' args? ')' | '[' expr ']')*
//! primary  := STRING | INT | 'True' | 'False' | 'None' | NAME | '(' expr ')'
//! ```
//!
//! Expressions are compiled once per rule and evaluated once per matching
//! configuration key. Nothing outside this closed grammar can run.

use std::fmt;

use crate::predicates::{PredicateError, PredicateRegistry};
use crate::value::EvalValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    Literal(EvalValue),
    Name(String),
    Call { name: String, args: Vec<Expr> },
    Subscript { target: Box<Expr>, index: Box<Expr> },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `a < b < c` is `a < b and b < c`
    Compare { first: Box<Expr>, rest: Vec<(CmpOp, Expr)> },
}

/// A compiled value rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    expr: Expr,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, PredicateError> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            len: source.len(),
        };
        let expr = parser.expression()?;
        if let Some((_, offset)) = parser.tokens.get(parser.pos) {
            return Err(syntax_error(*offset, "unexpected token"));
        }
        Ok(Expression {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `VAL` bound to `val` and `CNF` to `cnf`.
    pub fn evaluate(
        &self,
        val: &EvalValue,
        cnf: &EvalValue,
        registry: &PredicateRegistry,
    ) -> Result<EvalValue, PredicateError> {
        let env = Env { val, cnf, registry };
        self.expr.evaluate(&env)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

struct Env<'a> {
    val: &'a EvalValue,
    cnf: &'a EvalValue,
    registry: &'a PredicateRegistry,
}

impl Expr {
    fn evaluate(&self, env: &Env<'_>) -> Result<EvalValue, PredicateError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => match name.as_str() {
                "VAL" => Ok(env.val.clone()),
                "CNF" => Ok(env.cnf.clone()),
                _ => Err(invalid(format!("name '{name}' is not defined"))),
            },
            Expr::Call { name, args } => {
                let predicate = env
                    .registry
                    .get(name)
                    .ok_or_else(|| invalid(format!("name '{name}' is not defined")))?;
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(env))
                    .collect::<Result<Vec<_>, _>>()?;
                predicate(env.val, &args)
            }
            Expr::Subscript { target, index } => {
                subscript(target.evaluate(env)?, index.evaluate(env)?)
            }
            Expr::Not(e) => Ok(EvalValue::Bool(!e.evaluate(env)?.is_truthy())),
            Expr::And(l, r) => {
                let l = l.evaluate(env)?;
                if l.is_truthy() { r.evaluate(env) } else { Ok(l) }
            }
            Expr::Or(l, r) => {
                let l = l.evaluate(env)?;
                if l.is_truthy() { Ok(l) } else { r.evaluate(env) }
            }
            Expr::Compare { first, rest } => {
                let mut left = first.evaluate(env)?;
                for (op, e) in rest {
                    let right = e.evaluate(env)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(EvalValue::Bool(false));
                    }
                    left = right;
                }
                Ok(EvalValue::Bool(true))
            }
        }
    }
}

fn invalid(message: impl Into<String>) -> PredicateError {
    PredicateError::Invalid(message.into())
}

fn syntax_error(offset: usize, message: &str) -> PredicateError {
    invalid(format!("invalid syntax at column {}: {message}", offset + 1))
}

fn subscript(target: EvalValue, index: EvalValue) -> Result<EvalValue, PredicateError> {
    match (target, index) {
        (EvalValue::Map(map), EvalValue::Str(key)) => map
            .get(&key)
            .cloned()
            .map(EvalValue::from)
            .ok_or_else(|| invalid(format!("KeyError: '{key}'"))),
        (EvalValue::Map(_), index) => Err(invalid(format!(
            "mapping keys are strings, not '{}'",
            index.type_name()
        ))),
        (target, _) => Err(invalid(format!(
            "'{}' object is not subscriptable",
            target.type_name()
        ))),
    }
}

fn compare(op: CmpOp, left: &EvalValue, right: &EvalValue) -> Result<bool, PredicateError> {
    use std::cmp::Ordering;

    let ordering = |left: &EvalValue, right: &EvalValue| -> Result<Ordering, PredicateError> {
        match (left, right) {
            (EvalValue::Int(a), EvalValue::Int(b)) => Ok(a.cmp(b)),
            (EvalValue::Str(a), EvalValue::Str(b)) => Ok(a.cmp(b)),
            _ => Err(invalid(format!(
                "'{op}' not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        }
    };
    let contains = |needle: &EvalValue, haystack: &EvalValue| match (needle, haystack) {
        (EvalValue::Str(n), EvalValue::Str(h)) => Ok(h.contains(n.as_str())),
        (EvalValue::Str(n), EvalValue::Map(m)) => Ok(m.contains_key(n)),
        (n, EvalValue::Str(_) | EvalValue::Map(_)) => Err(invalid(format!(
            "'in' requires a string as left operand, not '{}'",
            n.type_name()
        ))),
        (_, h) => Err(invalid(format!(
            "argument of type '{}' is not iterable",
            h.type_name()
        ))),
    };

    match op {
        CmpOp::Eq => Ok(left == right),
        CmpOp::Ne => Ok(left != right),
        CmpOp::Lt => Ok(ordering(left, right)? == Ordering::Less),
        CmpOp::Le => Ok(ordering(left, right)? != Ordering::Greater),
        CmpOp::Gt => Ok(ordering(left, right)? == Ordering::Greater),
        CmpOp::Ge => Ok(ordering(left, right)? != Ordering::Less),
        CmpOp::In => contains(left, right),
        CmpOp::NotIn => contains(left, right).map(|found| !found),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Str(String),
    Int(i64),
    Name(String),
    Cmp(CmpOp),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn lex(source: &str) -> Result<Vec<(Token, usize)>, PredicateError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '(' | ')' | '[' | ']' | ',' => {
                chars.next();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    _ => Token::Comma,
                }
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = chars.next_if(|&(_, c)| c == '=').is_some();
                let op = match (c, followed_by_eq) {
                    ('=', true) => CmpOp::Eq,
                    ('!', true) => CmpOp::Ne,
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    ('>', true) => CmpOp::Ge,
                    _ => return Err(syntax_error(offset, &format!("unexpected '{c}'"))),
                };
                Token::Cmp(op)
            }
            '\'' | '"' => {
                chars.next();
                Token::Str(string(&mut chars, c, false, offset)?)
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some((_, d)) = chars.next_if(|(_, d)| d.is_ascii_digit()) {
                    digits.push(d);
                }
                let n = digits
                    .parse()
                    .map_err(|_| syntax_error(offset, "integer literal too large"))?;
                Token::Int(n)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some((_, n)) = chars.next_if(|(_, n)| n.is_alphanumeric() || *n == '_') {
                    name.push(n);
                }
                match chars.peek() {
                    Some(&(_, quote @ ('\'' | '"'))) if name == "r" || name == "R" => {
                        chars.next();
                        Token::Str(string(&mut chars, quote, true, offset)?)
                    }
                    _ => Token::Name(name),
                }
            }
            _ => return Err(syntax_error(offset, &format!("unexpected '{c}'"))),
        };
        tokens.push((token, offset));
    }
    Ok(tokens)
}

/// Rest of a string literal after its opening quote. Unknown escapes keep
/// their backslash, so regular expressions such as `'\d+'` survive.
fn string(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    quote: char,
    raw: bool,
    offset: usize,
) -> Result<String, PredicateError> {
    let mut out = String::new();
    loop {
        let Some((_, c)) = chars.next() else {
            return Err(syntax_error(offset, "unterminated string"));
        };
        match c {
            c if c == quote => return Ok(out),
            '\\' => {
                let Some((_, e)) = chars.next() else {
                    return Err(syntax_error(offset, "unterminated string"));
                };
                match e {
                    _ if raw => {
                        out.push('\\');
                        out.push(e);
                    }
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '\\' | '\'' | '"' => out.push(e),
                    _ => {
                        out.push('\\');
                        out.push(e);
                    }
                }
            }
            c => out.push(c),
        }
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    /// Offset reported for errors at the end of input
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.len, |(_, o)| *o)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), PredicateError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(syntax_error(self.offset(), &format!("expected {what}")))
        }
    }

    fn is_keyword(&self, index: usize, keyword: &str) -> bool {
        matches!(self.tokens.get(index), Some((Token::Name(n), _)) if n == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(self.pos, keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, PredicateError> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, PredicateError> {
        let first = self.postfix()?;
        let mut rest = Vec::new();
        loop {
            let op = if let Some(&Token::Cmp(op)) = self.peek() {
                self.pos += 1;
                op
            } else if self.eat_keyword("in") {
                CmpOp::In
            } else if self.is_keyword(self.pos, "not") && self.is_keyword(self.pos + 1, "in") {
                self.pos += 2;
                CmpOp::NotIn
            } else {
                break;
            };
            rest.push((op, self.postfix()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn postfix(&mut self) -> Result<Expr, PredicateError> {
        let mut expr = self.primary()?;
        loop {
            if self.peek() == Some(&Token::LParen) {
                let offset = self.offset();
                self.pos += 1;
                let Expr::Name(name) = expr else {
                    return Err(syntax_error(offset, "only predicates can be called"));
                };
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' or ')'")?;
                    }
                }
                expr = Expr::Call { name, args };
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(&Token::RBracket, "']'")?;
                expr = Expr::Subscript {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, PredicateError> {
        let offset = self.offset();
        let Some(token) = self.peek().cloned() else {
            return Err(syntax_error(offset, "unexpected end of rule"));
        };
        self.pos += 1;
        match token {
            Token::Str(s) => Ok(Expr::Literal(EvalValue::Str(s))),
            Token::Int(i) => Ok(Expr::Literal(EvalValue::Int(i))),
            Token::Name(name) => match name.as_str() {
                "True" => Ok(Expr::Literal(EvalValue::Bool(true))),
                "False" => Ok(Expr::Literal(EvalValue::Bool(false))),
                "None" => Ok(Expr::Literal(EvalValue::None)),
                "and" | "or" | "not" | "in" => {
                    Err(syntax_error(offset, &format!("unexpected '{name}'")))
                }
                _ => Ok(Expr::Name(name)),
            },
            Token::LParen => {
                let expr = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(syntax_error(offset, "unexpected token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgldr_section::{PlainMap, PlainValue};

    fn cnf() -> EvalValue {
        let mut inner = PlainMap::new();
        inner.insert("depth".to_string(), PlainValue::Text("3".to_string()));
        let mut map = PlainMap::new();
        map.insert("port".to_string(), PlainValue::Text("8080".to_string()));
        map.insert("mode".to_string(), PlainValue::Text("strict".to_string()));
        map.insert("limits".to_string(), PlainValue::Map(inner));
        EvalValue::Map(map)
    }

    fn eval(source: &str, val: &str) -> Result<EvalValue, PredicateError> {
        let registry = PredicateRegistry::new();
        Expression::compile(source)?.evaluate(&EvalValue::from(val), &cnf(), &registry)
    }

    fn truthy(source: &str, val: &str) -> bool {
        eval(source, val).unwrap().is_truthy()
    }

    fn error(source: &str) -> String {
        match eval(source, "v") {
            Err(PredicateError::Invalid(message)) => message,
            other => panic!("expected an invalid rule, got {other:?}"),
        }
    }

    #[test]
    fn test_literals_and_bindings() {
        assert_eq!(eval("VAL", "x").unwrap(), EvalValue::from("x"));
        assert_eq!(eval("'a\\tb'", "x").unwrap(), EvalValue::from("a\tb"));
        assert_eq!(eval("\"q\\\"q\"", "x").unwrap(), EvalValue::from("q\"q"));
        assert_eq!(eval("'\\d+'", "x").unwrap(), EvalValue::from("\\d+"));
        assert_eq!(eval("r'\\n'", "x").unwrap(), EvalValue::from("\\n"));
        assert_eq!(eval("42", "x").unwrap(), EvalValue::Int(42));
        assert_eq!(eval("None", "x").unwrap(), EvalValue::None);
        assert_eq!(eval("CNF['port']", "x").unwrap(), EvalValue::from("8080"));
        assert_eq!(eval("CNF['limits']['depth']", "x").unwrap(), EvalValue::from("3"));
    }

    #[test]
    fn test_boolean_operators() {
        assert!(truthy("True and not False", "x"));
        assert!(truthy("False or VAL", "x"));
        assert!(!truthy("False or VAL", ""));
        assert!(truthy("not (False and True)", "x"));
        // `and` binds tighter than `or`
        assert!(truthy("True or False and False", "x"));
        assert_eq!(eval("'' or 'fallback'", "x").unwrap(), EvalValue::from("fallback"));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        assert!(!truthy("False and undefined_name", "x"));
        assert!(truthy("True or fail('never')", "x"));
    }

    #[test]
    fn test_comparisons() {
        assert!(truthy("VAL == 'on'", "on"));
        assert!(truthy("VAL != 'on'", "off"));
        assert!(truthy("'a' < VAL <= 'c'", "c"));
        assert!(!truthy("'a' < VAL <= 'c'", "d"));
        assert!(truthy("1 < 2 < 3", "x"));
        assert!(truthy("VAL in 'strict lenient'", "lenient"));
        assert!(truthy("VAL in CNF['mode']", "str"));
        assert!(truthy("'port' in CNF", "x"));
        assert!(truthy("'host' not in CNF", "x"));
        assert!(truthy("not 'host' in CNF", "x"));
    }

    #[test]
    fn test_predicates() {
        assert!(truthy("re('[0-9]+')", "42"));
        assert!(!truthy("re('[0-9]+')", "x42"));
        assert!(truthy("re('[0-9]+') and cond(CNF['mode'] == 'strict', 'strict only')", "1"));
        assert_eq!(
            eval("cond(VAL == 'yes', 'must be yes')", "no"),
            Err(PredicateError::Failed("must be yes".to_string()))
        );
        assert_eq!(
            eval("fail('not allowed')", "x"),
            Err(PredicateError::Failed("not allowed".to_string()))
        );
    }

    #[test]
    fn test_evaluation_errors() {
        assert_eq!(error("foo"), "name 'foo' is not defined");
        assert_eq!(error("foo('x')"), "name 'foo' is not defined");
        assert_eq!(error("CNF['missing']"), "KeyError: 'missing'");
        assert_eq!(error("VAL['x']"), "'str' object is not subscriptable");
        assert_eq!(
            error("VAL < 3"),
            "'<' not supported between instances of 'str' and 'int'"
        );
        assert_eq!(error("1 in 2"), "argument of type 'int' is not iterable");
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(error("re('x'"), "invalid syntax at column 7: expected ',' or ')'");
        assert_eq!(error("VAL ="), "invalid syntax at column 5: unexpected '='");
        assert_eq!(error("'open"), "invalid syntax at column 1: unterminated string");
        assert_eq!(error("VAL VAL"), "invalid syntax at column 5: unexpected token");
        assert_eq!(error("'x'('y')"), "invalid syntax at column 4: only predicates can be called");
        assert_eq!(error(""), "invalid syntax at column 1: unexpected end of rule");
        assert_eq!(error("and"), "invalid syntax at column 1: unexpected 'and'");
    }

    #[test]
    fn test_source_is_kept() {
        let e = Expression::compile("re( '[a-z]+' )").unwrap();
        assert_eq!(e.source(), "re( '[a-z]+' )");
        assert_eq!(e.to_string(), "re( '[a-z]+' )");
    }
}
