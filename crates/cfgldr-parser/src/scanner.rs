//! Byte-offset cursor over normalized document text.

use regex::Regex;

/// Horizontal whitespace, including the characters that are ignored
/// everywhere outside quoted values.
pub(crate) fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\x0b' | '\x0c')
}

/// A cheap, copyable cursor. Alternatives are tried on a copy and the copy
/// is kept only when it matches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner { src, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Text between two earlier positions.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.src[start..end]
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// True at a line break or at the end of input.
    pub fn at_line_end(&self) -> bool {
        matches!(self.peek(), None | Some('\n'))
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Move forward by `n` bytes, which must end on a character boundary.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.src.len());
    }

    pub fn eat_char(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    pub fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    /// Consume the longest prefix matched by `re`, which must be anchored with `^`.
    pub fn eat_regex(&mut self, re: &Regex) -> Option<&'a str> {
        let rest = self.rest();
        let m = re.find(rest)?;
        if m.start() != 0 || m.is_empty() {
            return None;
        }
        self.pos += m.end();
        Some(&rest[..m.end()])
    }

    /// Skip horizontal whitespace; returns whether anything was skipped.
    pub fn skip_spaces(&mut self) -> bool {
        !self.eat_while(is_space).is_empty()
    }

    /// Skip to the line break (not consuming it).
    pub fn skip_line(&mut self) {
        self.eat_while(|c| c != '\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cursor() {
        let mut s = Scanner::new("ab\tc\n");
        assert!(s.eat_char('a'));
        assert!(!s.eat_char('x'));
        assert_eq!(s.eat_while(|c| c == 'b'), "b");
        assert!(s.skip_spaces());
        assert!(!s.skip_spaces());
        assert_eq!(s.bump(), Some('c'));
        assert!(s.at_line_end());
        assert_eq!(s.bump(), Some('\n'));
        assert!(s.rest().is_empty());
        assert_eq!(s.bump(), None);
    }

    #[test]
    fn test_copy_backtracks() {
        let mut s = Scanner::new("key = value");
        let mut attempt = s;
        assert!(attempt.eat_str("key"));
        assert_eq!(s.pos(), 0);
        s = attempt;
        assert_eq!(s.rest(), " = value");
    }

    #[test]
    fn test_eat_regex_requires_prefix_match() {
        let re = Regex::new("^[a-z]+").unwrap();
        let mut s = Scanner::new("abc1");
        assert_eq!(s.eat_regex(&re), Some("abc"));
        assert_eq!(s.eat_regex(&re), None);
        assert_eq!(s.pos(), 3);
    }

    #[test]
    fn test_skip_line() {
        let mut s = Scanner::new("# comment\nnext");
        s.skip_line();
        assert_eq!(s.rest(), "\nnext");
    }
}
