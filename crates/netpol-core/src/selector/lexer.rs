//! Tokenizer for the selector grammar.
//!
//! Splits a selector string into a flat token stream, folding the fixed-shape
//! constructs (`has(label)`, `all()`, `not in`) into single tokens so the
//! parser only has to deal with expression structure. Every token records the
//! byte offset it started at; all error positions reported by the parser are
//! byte offsets into the original input.

use std::iter::Peekable;
use std::str::CharIndices;

use super::ParseError;

/// A single lexed token plus the byte offset it started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

/// The kinds of token the selector grammar contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// A label name.
    Ident(String),
    /// A quoted string literal (quotes stripped).
    Literal(String),
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `has(<label>)`, folded into one token with the label inside.
    Has(String),
    /// `all()`
    All,
    /// `!`
    Not,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-')
}

/// Tokenizes a selector string.
///
/// Returns the token stream, or a [`ParseError`] on an unterminated string
/// literal, a lone `&`/`|`/`=`, or any character outside the grammar.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Lexer {
        input,
        chars: input.char_indices().peekable(),
    }
    .run()
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            let kind = match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ',' => self.single(TokenKind::Comma),
                '=' => self.pair('=', pos, TokenKind::Eq, "expected '=='")?,
                '&' => self.pair('&', pos, TokenKind::And, "expected '&&'")?,
                '|' => self.pair('|', pos, TokenKind::Or, "expected '||'")?,
                '!' => {
                    self.chars.next();
                    if self.peek_char() == Some('=') {
                        self.chars.next();
                        TokenKind::Ne
                    } else {
                        TokenKind::Not
                    }
                },
                '"' | '\'' => self.literal(pos, c)?,
                c if is_ident_start(c) => self.ident_or_keyword(pos)?,
                c => {
                    return Err(ParseError {
                        pos,
                        msg: format!("unexpected character {c:?}"),
                    });
                },
            };
            tokens.push(Token { kind, pos });
        }
        Ok(tokens)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.chars.next();
        kind
    }

    /// Consumes a two-character operator whose characters are identical.
    fn pair(
        &mut self,
        second: char,
        pos: usize,
        kind: TokenKind,
        msg: &str,
    ) -> Result<TokenKind, ParseError> {
        self.chars.next();
        if self.peek_char() == Some(second) {
            self.chars.next();
            Ok(kind)
        } else {
            Err(ParseError {
                pos,
                msg: msg.to_string(),
            })
        }
    }

    /// Consumes a quoted string literal. `quote` is the opening quote
    /// character; the matching close quote is required.
    fn literal(&mut self, open_pos: usize, quote: char) -> Result<TokenKind, ParseError> {
        self.chars.next();
        let start = self.chars.peek().map_or(self.input.len(), |&(i, _)| i);
        for (i, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(TokenKind::Literal(self.input[start..i].to_string()));
            }
        }
        Err(ParseError {
            pos: open_pos,
            msg: "unterminated string literal".to_string(),
        })
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    /// Consumes an identifier, resolving the reserved words `has`, `all`,
    /// `in` and `not` into their keyword tokens.
    fn ident_or_keyword(&mut self, pos: usize) -> Result<TokenKind, ParseError> {
        let name = self.ident_text();
        match name.as_str() {
            "has" => self.has_expr(pos),
            "all" => self.all_expr(pos),
            "in" => Ok(TokenKind::In),
            "not" => {
                self.skip_whitespace();
                let in_pos = self.chars.peek().map_or(self.input.len(), |&(i, _)| i);
                if self.peek_char().is_some_and(is_ident_start) && self.ident_text() == "in" {
                    Ok(TokenKind::NotIn)
                } else {
                    Err(ParseError {
                        pos: in_pos,
                        msg: "expected 'in' after 'not'".to_string(),
                    })
                }
            },
            _ => Ok(TokenKind::Ident(name)),
        }
    }

    fn ident_text(&mut self) -> String {
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !is_ident_continue(c) {
                break;
            }
            name.push(c);
            self.chars.next();
        }
        name
    }

    /// Consumes the remainder of `has(<label>)`; the `has` word itself has
    /// already been consumed.
    fn has_expr(&mut self, pos: usize) -> Result<TokenKind, ParseError> {
        if self.peek_char() != Some('(') {
            return Err(ParseError {
                pos,
                msg: "expected '(' after 'has'".to_string(),
            });
        }
        self.chars.next();
        self.skip_whitespace();
        if !self.peek_char().is_some_and(is_ident_start) {
            return Err(ParseError {
                pos,
                msg: "expected a label name inside has()".to_string(),
            });
        }
        let label = self.ident_text();
        self.skip_whitespace();
        if self.peek_char() != Some(')') {
            return Err(ParseError {
                pos,
                msg: "expected ')' to close has(".to_string(),
            });
        }
        self.chars.next();
        Ok(TokenKind::Has(label))
    }

    /// Consumes the `()` of `all()`; the `all` word itself has already been
    /// consumed.
    fn all_expr(&mut self, pos: usize) -> Result<TokenKind, ParseError> {
        if self.peek_char() == Some('(') {
            self.chars.next();
            if self.peek_char() == Some(')') {
                self.chars.next();
                return Ok(TokenKind::All);
            }
        }
        Err(ParseError {
            pos,
            msg: "expected '()' after 'all'".to_string(),
        })
    }
}
