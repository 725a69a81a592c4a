//! Command tokenizer
//!
//! Splits a raw launch command into argument tokens. Only the quoting subset
//! needed for paths with spaces is supported: a quote opens a span that ends
//! at the next occurrence of the same quote character, and the quotes stay in
//! the token. There is no escape processing.

use std::fmt;

/// One argument of a launch command, quotes preserved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the whole token is wrapped in one pair of matching quotes
    pub fn is_quoted(&self) -> bool {
        let s = self.0.as_str();
        s.len() >= 2
            && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    }

    /// The token text without its surrounding quotes
    pub fn unquoted(&self) -> &str {
        if self.is_quoted() {
            &self.0[1..self.0.len() - 1]
        } else {
            &self.0
        }
    }

    /// `-x` or `--xyz`; negative numbers such as `-1` are values, not flags
    pub fn is_flag(&self) -> bool {
        let mut chars = self.0.chars();
        chars.next() == Some('-')
            && chars
                .next()
                .is_some_and(|c| c == '-' || c.is_ascii_alphabetic())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for Token {
    fn from(text: String) -> Self {
        Self(text)
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Commands saved with newlines in place of spaces
fn needs_newline_repair(raw: &str) -> bool {
    !raw.contains(' ') && raw.contains('\n')
}

fn repair_newlines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a raw command into tokens
pub fn tokenize(raw: &str) -> Vec<Token> {
    let repaired;
    let input = if needs_newline_repair(raw) {
        repaired = repair_newlines(raw);
        repaired.as_str()
    } else {
        raw
    };

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if is_separator(c) => {
                if !current.is_empty() {
                    tokens.push(Token(std::mem::take(&mut current)));
                }
            }
            None => {
                if (c == '"' || c == '\'') && prev != Some('\\') {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
        prev = Some(c);
    }

    if !current.is_empty() {
        tokens.push(Token(current));
    }

    tokens
}

/// Join tokens back into a command with single spaces
pub fn join_tokens<'a, I>(tokens: I) -> String
where
    I: IntoIterator<Item = &'a Token>,
{
    tokens
        .into_iter()
        .map(Token::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
