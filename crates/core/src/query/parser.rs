//! Recursive-descent parser for the rule query language
//!
//! Grammar:
//! ```text
//! query      := orExpr
//! orExpr     := andExpr ("OR" andExpr)*
//! andExpr    := primary (SPACE primary)*          // implicit AND
//! primary    := "(" orExpr ")" | "-" condition | condition | bareTerm
//! condition  := PROP ":" value
//! value      := QUOTED_STRING | BARE_TOKEN
//! bareTerm   := BARE_TOKEN                        // equivalent to text:BARE_TOKEN
//! PROP       := [a-z][a-z0-9-]*
//! ```
//!
//! Whitespace separates tokens except inside `"…"`; `(`, `)` and a leading
//! `-` are delimiters; `OR` (case-insensitive, standalone) is the only
//! keyword. Errors carry the byte position of the offending input.

use hourmark_domain::{HourmarkError, Result};

use super::ast::{Condition, Query};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    Or,
    Term { negated: bool, prop: Option<String>, value: String },
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn parse_err(position: usize, message: impl Into<String>) -> HourmarkError {
    HourmarkError::Parse { position, message: message.into() }
}

/// Parse a query string into its AST.
///
/// # Errors
/// Returns [`HourmarkError::Parse`] with the byte position of the problem;
/// no partial AST is ever returned.
pub fn parse(input: &str) -> Result<Query> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(parse_err(0, "empty query"));
    }
    let mut parser = Parser { tokens, index: 0, input_len: input.len() };
    let query = parser.parse_or()?;
    if let Some(tok) = parser.peek() {
        return Err(parse_err(tok.pos, "unexpected ')'"));
    }
    Ok(query)
}

fn is_valid_prop(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Read a quoted string starting at `open` (which must index a `"`).
/// Returns the unquoted value and the index after the closing quote.
fn read_quoted(chars: &[(usize, char)], open: usize) -> Result<(String, usize)> {
    let open_pos = chars[open].0;
    let mut value = String::new();
    let mut i = open + 1;
    while i < chars.len() {
        let (_, c) = chars[i];
        if c == '"' {
            return Ok((value, i + 1));
        }
        value.push(c);
        i += 1;
    }
    Err(parse_err(open_pos, "unmatched quote"))
}

fn is_term_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')')
}

#[allow(clippy::too_many_lines)]
fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, pos });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, pos });
                i += 1;
            }
            '"' => {
                let (value, next) = read_quoted(&chars, i)?;
                tokens.push(Token {
                    kind: TokenKind::Term { negated: false, prop: None, value },
                    pos,
                });
                i = next;
            }
            _ => {
                let mut j = i;
                let mut negated = false;

                if c == '-' {
                    negated = true;
                    j += 1;
                    if j >= chars.len() || is_term_boundary(chars[j].1) || chars[j].1 == '-' {
                        return Err(parse_err(pos, "dangling '-'"));
                    }
                }

                // Negated quoted term: -"some phrase"
                if chars[j].1 == '"' {
                    let (value, next) = read_quoted(&chars, j)?;
                    tokens.push(Token { kind: TokenKind::Term { negated, prop: None, value }, pos });
                    i = next;
                    continue;
                }

                let mut prop: Option<String> = None;
                let mut buf = String::new();
                let mut quoted_value = false;

                while j < chars.len() {
                    let (_, ch) = chars[j];
                    if is_term_boundary(ch) {
                        break;
                    }
                    if ch == '"' {
                        // A quote is only meaningful directly after "prop:"
                        if prop.is_some() && buf.is_empty() {
                            let (value, next) = read_quoted(&chars, j)?;
                            buf = value;
                            j = next;
                            quoted_value = true;
                        }
                        break;
                    }
                    if ch == ':' && prop.is_none() && is_valid_prop(&buf) {
                        prop = Some(std::mem::take(&mut buf));
                        j += 1;
                        continue;
                    }
                    buf.push(ch);
                    j += 1;
                }

                if prop.is_some() && buf.is_empty() && !quoted_value {
                    return Err(parse_err(pos, "expected value after ':'"));
                }

                let standalone_or =
                    prop.is_none() && !negated && !quoted_value && buf.eq_ignore_ascii_case("or");

                if standalone_or {
                    tokens.push(Token { kind: TokenKind::Or, pos });
                } else {
                    tokens.push(Token { kind: TokenKind::Term { negated, prop, value: buf }, pos });
                }
                i = j;
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.index).cloned();
        if tok.is_some() {
            self.index += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<Query> {
        let mut parts = vec![self.parse_and()?];

        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Or)) {
            let or_pos = self.peek().map_or(self.input_len, |t| t.pos);
            self.index += 1;
            match self.peek().map(|t| &t.kind) {
                None | Some(TokenKind::RParen) => {
                    return Err(parse_err(or_pos, "expected expression after OR"));
                }
                _ => parts.push(self.parse_and()?),
            }
        }

        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Query::Or(parts))
        }
    }

    fn parse_and(&mut self) -> Result<Query> {
        let mut parts = Vec::new();

        loop {
            match self.peek().map(|t| &t.kind) {
                None | Some(TokenKind::RParen | TokenKind::Or) => break,
                _ => parts.push(self.parse_primary()?),
            }
        }

        match parts.len() {
            0 => {
                let pos = self.peek().map_or(self.input_len, |t| t.pos);
                Err(parse_err(pos, "expected expression"))
            }
            1 => Ok(parts.remove(0)),
            _ => Ok(Query::And(parts)),
        }
    }

    fn parse_primary(&mut self) -> Result<Query> {
        let Some(token) = self.advance() else {
            return Err(parse_err(self.input_len, "unexpected end of query"));
        };

        match token.kind {
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                match self.peek().map(|t| &t.kind) {
                    Some(TokenKind::RParen) => {
                        self.index += 1;
                        Ok(inner)
                    }
                    _ => Err(parse_err(token.pos, "unclosed parenthesis")),
                }
            }
            TokenKind::RParen => Err(parse_err(token.pos, "unexpected ')'")),
            TokenKind::Or => Err(parse_err(token.pos, "unexpected OR")),
            TokenKind::Term { negated, prop, value } => Ok(Query::Condition(Condition {
                prop: prop.unwrap_or_else(|| "text".to_string()),
                value,
                negated,
            })),
        }
    }
}
