use std::fmt;

use crate::error::{KinError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A bare word, number or quoted string.
    Word(String),
    /// One of `{`, `}`, `:` or `;`.
    Delim(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::Delim(c) => write!(f, "{c}"),
        }
    }
}

/// Whitespace tokenizer for the line-oriented text formats (`.sm`, channel
/// lists, BVH). `#` starts a comment running to the end of the line.
#[derive(Debug, Clone)]
pub struct Tokens {
    items: Vec<(Token, usize)>,
    pos: usize,
}

fn is_delim(c: char) -> bool {
    matches!(c, '{' | '}' | ':' | ';')
}

impl Tokens {
    pub fn new(text: &str) -> Self {
        let mut items = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            let mut chars = line.chars().peekable();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    chars.next();
                } else if c == '#' {
                    break;
                } else if is_delim(c) {
                    chars.next();
                    items.push((Token::Delim(c), line_no));
                } else if c == '"' {
                    chars.next();
                    let mut word = String::new();
                    for c in chars.by_ref() {
                        if c == '"' {
                            break;
                        }
                        word.push(c);
                    }
                    items.push((Token::Word(word), line_no));
                } else {
                    let mut word = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() || is_delim(c) || c == '#' {
                            break;
                        }
                        word.push(c);
                        chars.next();
                    }
                    items.push((Token::Word(word), line_no));
                }
            }
        }
        Self { items, pos: 0 }
    }

    /// Line of the next token (or of the last one at the end of input).
    pub fn line(&self) -> usize {
        self.items
            .get(self.pos)
            .or_else(|| self.items.last())
            .map_or(0, |(_, l)| *l)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.items.get(self.pos).map(|(t, _)| t)
    }

    pub fn next_token(&mut self) -> Option<&Token> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(&item.0)
    }

    pub fn unget(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    pub fn peek_word(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w),
            _ => None,
        }
    }

    pub fn peek_is_number(&self) -> bool {
        self.peek_word().is_some_and(|w| w.parse::<f32>().is_ok())
    }

    pub fn peek_is(&self, keyword: &str) -> bool {
        self.peek_word().is_some_and(|w| w.eq_ignore_ascii_case(keyword))
    }

    /// Consumes `keyword` if it is next.
    pub fn eat(&mut self, keyword: &str) -> bool {
        if self.peek_is(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_delim(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Delim(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_word(&mut self, context: &'static str) -> Result<String> {
        let line = self.line();
        match self.next_token() {
            Some(Token::Word(w)) => Ok(w.clone()),
            Some(t) => Err(KinError::parse(line, format!("expected {context}, found '{t}'"))),
            None => Err(KinError::UnexpectedEof { context }),
        }
    }

    pub fn expect_keyword(&mut self, keyword: &'static str) -> Result<()> {
        let line = self.line();
        let w = self.expect_word(keyword)?;
        if w.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(KinError::parse(line, format!("expected '{keyword}', found '{w}'")))
        }
    }

    pub fn expect_delim(&mut self, c: char) -> Result<()> {
        let line = self.line();
        match self.next_token() {
            Some(Token::Delim(d)) if *d == c => Ok(()),
            Some(t) => Err(KinError::parse(line, format!("expected '{c}', found '{t}'"))),
            None => Err(KinError::UnexpectedEof { context: "delimiter" }),
        }
    }

    pub fn expect_f32(&mut self, context: &'static str) -> Result<f32> {
        let line = self.line();
        let w = self.expect_word(context)?;
        w.parse()
            .map_err(|_| KinError::parse(line, format!("expected {context}, found '{w}'")))
    }

    pub fn expect_usize(&mut self, context: &'static str) -> Result<usize> {
        let line = self.line();
        let w = self.expect_word(context)?;
        w.parse()
            .map_err(|_| KinError::parse(line, format!("expected {context}, found '{w}'")))
    }
}
