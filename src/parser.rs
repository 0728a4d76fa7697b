// src/parser.rs
// Character cursor shared by the XPath and CSS selector parsers.

#[derive(Debug)]
pub enum ParseErr {
    InvalidSyntax(String),
}

impl From<String> for ParseErr {
    fn from(msg: String) -> Self {
        ParseErr::InvalidSyntax(msg)
    }
}

pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    /// Element, attribute, axis or function name: letters, digits, `_`, `-`, `.`.
    /// Must not start with a digit, `-` or `.`.
    pub fn parse_name(&mut self) -> Result<String, ParseErr> {
        let start = self.i;
        match self.peek_char() {
            Some(c) if c == '_' || c.is_alphabetic() => self.i += c.len_utf8(),
            _ => return Err(ParseErr::InvalidSyntax("name expected".into())),
        }
        while let Some(c) = self.peek_char() {
            if c == '_' || c == '-' || c == '.' || c.is_alphanumeric() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        Ok(self.s[start..self.i].to_string())
    }

    pub fn parse_number_literal(&mut self) -> Result<f64, ParseErr> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.i += 1;
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') {
            self.i += 1;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.i += 1;
                } else {
                    break;
                }
            }
        }
        let s = &self.s[start..self.i];
        if s.is_empty() || s == "." {
            return Err(ParseErr::InvalidSyntax("number expected".into()));
        }
        s.parse()
            .map_err(|_| ParseErr::InvalidSyntax("bad number".into()))
    }

    /// A quoted literal. XPath literals have no escapes: the other quote kind
    /// is the only way to embed a quote character.
    pub fn parse_quoted_string(&mut self) -> Result<String, ParseErr> {
        let quote = self
            .peek_char()
            .ok_or_else(|| ParseErr::InvalidSyntax("string".into()))?;
        if quote != '\'' && quote != '"' {
            return Err(ParseErr::InvalidSyntax("expected quoted string".into()));
        }
        self.i += 1;
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == quote {
                let out = self.s[start..self.i].to_string();
                self.i += 1;
                return Ok(out);
            }
            self.i += c.len_utf8();
        }
        Err(ParseErr::InvalidSyntax("unterminated string".into()))
    }

    /// Everything up to (not including) the next char satisfying `stop`.
    pub fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'a str {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if stop(c) {
                break;
            }
            self.i += c.len_utf8();
        }
        &self.s[start..self.i]
    }

    pub fn expect(&mut self, c: char) -> Result<(), ParseErr> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(ParseErr::InvalidSyntax(format!("expected '{}'", c)))
        }
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn consume_str(&mut self, lit: &str) -> bool {
        if self.peek_str(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    /// Consume `word` only when it is not the prefix of a longer name.
    pub fn consume_keyword(&mut self, word: &str) -> bool {
        if !self.peek_str(word) {
            return false;
        }
        let next = self.s[self.i + word.len()..].chars().next();
        if next.is_some_and(|c| c == '_' || c == '-' || c == '.' || c.is_alphanumeric()) {
            return false;
        }
        self.i += word.len();
        true
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.s[self.i..].chars().nth(n)
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    /// Look past whitespace for `lit` without consuming anything.
    pub fn peek_after_ws(&self, lit: &str) -> bool {
        self.s[self.i..].trim_start().starts_with(lit)
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn pos(&self) -> usize {
        self.i
    }

    pub fn rewind(&mut self, pos: usize) {
        self.i = pos;
    }

    pub fn rest(&self) -> &'a str {
        &self.s[self.i..]
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}
