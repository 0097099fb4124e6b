//! Recursive-descent parser for the selector grammar.
//!
//! Grammar, loosest-binding first:
//!
//! ```text
//! selector   = ws [ orExpr ] ws
//! orExpr     = andExpr *( "||" andExpr )
//! andExpr    = notExpr *( "&&" notExpr )
//! notExpr    = *( "!" ) primary
//! primary    = "(" orExpr ")" | "all()" | "has(" ident ")"
//!            | ident ("==" | "!=") literal
//!            | ident ("in" | "not in") "{" [ literal *( "," literal ) ] "}"
//! ```
//!
//! The empty (or whitespace-only) selector is not an error; it parses to
//! [`Node::All`]. Everything else that falls outside the grammar is rejected
//! with a [`ParseError`] carrying the byte offset of the offending token.

use super::ParseError;
use super::ast::Node;
use super::lexer::{Token, TokenKind, tokenize};

/// Parses a selector string into an expression tree.
pub(crate) fn parse_node(input: &str) -> Result<Node, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(Node::All);
    }
    let mut parser = Parser {
        tokens,
        next: 0,
        input_len: input.len(),
    };
    let node = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(ParseError {
            pos: token.pos,
            msg: "unexpected trailing input".to_string(),
        });
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    next: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.next)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.next).cloned();
        if token.is_some() {
            self.next += 1;
        }
        token
    }

    /// Position to report when the input ends too early.
    fn eof_pos(&self) -> usize {
        self.input_len
    }

    fn or_expr(&mut self) -> Result<Node, ParseError> {
        let mut node = self.and_expr()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Or)) {
            self.advance();
            let rhs = self.and_expr()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn and_expr(&mut self) -> Result<Node, ParseError> {
        let mut node = self.not_expr()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::And)) {
            self.advance();
            let rhs = self.not_expr()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn not_expr(&mut self) -> Result<Node, ParseError> {
        let mut negations = 0usize;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Not)) {
            self.advance();
            negations += 1;
        }
        let mut node = self.primary()?;
        for _ in 0..negations {
            node = Node::Not(Box::new(node));
        }
        Ok(node)
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError {
                pos: self.eof_pos(),
                msg: "unexpected end of selector".to_string(),
            });
        };
        match token.kind {
            TokenKind::LParen => {
                let node = self.or_expr()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(node),
                    Some(t) => Err(ParseError {
                        pos: t.pos,
                        msg: "unmatched parenthesis".to_string(),
                    }),
                    None => Err(ParseError {
                        pos: self.eof_pos(),
                        msg: "unmatched parenthesis".to_string(),
                    }),
                }
            },
            TokenKind::All => Ok(Node::All),
            TokenKind::Has(key) => Ok(Node::Has { key }),
            TokenKind::Ident(key) => self.comparison(key, token.pos),
            TokenKind::Literal(_) => Err(ParseError {
                pos: token.pos,
                msg: "literal on the left-hand side of a comparison".to_string(),
            }),
            _ => Err(ParseError {
                pos: token.pos,
                msg: "expected an expression".to_string(),
            }),
        }
    }

    /// Parses the comparator and right-hand side after a label name.
    fn comparison(&mut self, key: String, key_pos: usize) -> Result<Node, ParseError> {
        match self.advance().map(|t| t.kind) {
            Some(TokenKind::Eq) => {
                let value = self.literal()?;
                Ok(Node::Equal { key, value })
            },
            Some(TokenKind::Ne) => {
                let value = self.literal()?;
                Ok(Node::NotEqual { key, value })
            },
            Some(TokenKind::In) => {
                let values = self.literal_set()?;
                Ok(Node::In { key, values })
            },
            Some(TokenKind::NotIn) => {
                let values = self.literal_set()?;
                Ok(Node::NotIn { key, values })
            },
            _ => Err(ParseError {
                pos: key_pos,
                msg: format!("label {key:?} must be followed by a comparator"),
            }),
        }
    }

    fn literal(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Literal(value),
                ..
            }) => Ok(value),
            Some(t) => Err(ParseError {
                pos: t.pos,
                msg: "expected a quoted literal".to_string(),
            }),
            None => Err(ParseError {
                pos: self.eof_pos(),
                msg: "expected a quoted literal".to_string(),
            }),
        }
    }

    /// Parses `{ [ literal *( "," literal ) ] }`. The empty set is legal and
    /// matches nothing.
    fn literal_set(&mut self) -> Result<Vec<String>, ParseError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::LBrace,
                ..
            }) => {},
            Some(t) => {
                return Err(ParseError {
                    pos: t.pos,
                    msg: "expected '{' to open a literal set".to_string(),
                });
            },
            None => {
                return Err(ParseError {
                    pos: self.eof_pos(),
                    msg: "expected '{' to open a literal set".to_string(),
                });
            },
        }
        let mut values = Vec::new();
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RBrace)) {
            self.advance();
            return Ok(values);
        }
        loop {
            values.push(self.literal()?);
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => {},
                Some(Token {
                    kind: TokenKind::RBrace,
                    ..
                }) => return Ok(values),
                Some(t) => {
                    return Err(ParseError {
                        pos: t.pos,
                        msg: "expected ',' or '}' in literal set".to_string(),
                    });
                },
                None => {
                    return Err(ParseError {
                        pos: self.eof_pos(),
                        msg: "expected ',' or '}' in literal set".to_string(),
                    });
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_parse_to_all() {
        assert_eq!(parse_node("").expect("parse"), Node::All);
        assert_eq!(parse_node("   ").expect("parse"), Node::All);
        assert_eq!(parse_node(" all() ").expect("parse"), Node::All);
    }

    #[test]
    fn precedence_binds_and_tighter_than_or() {
        let node = parse_node("has(a) && has(b) || has(c)").expect("parse");
        let Node::Or(lhs, _) = node else {
            panic!("expected || at the root, got {node:?}");
        };
        assert!(matches!(*lhs, Node::And(..)));
    }

    #[test]
    fn negation_binds_tighter_than_comparison_chain() {
        let node = parse_node("!a == 'a1' && b == 'b1'").expect("parse");
        let Node::And(lhs, _) = node else {
            panic!("expected && at the root, got {node:?}");
        };
        assert!(matches!(*lhs, Node::Not(_)));
    }

    #[test]
    fn parenthesised_expression_strips_to_inner_node() {
        assert_eq!(parse_node("(all())").expect("parse"), Node::All);
        assert_eq!(parse_node(" (all() )").expect("parse"), Node::All);
    }

    #[test]
    fn membership_preserves_source_order() {
        let node = parse_node(r#"a in {"z", "a", "m"}"#).expect("parse");
        assert_eq!(
            node,
            Node::In {
                key: "a".to_string(),
                values: vec!["z".to_string(), "a".to_string(), "m".to_string()],
            }
        );
    }

    #[test]
    fn rejects_known_bad_selectors() {
        // Fixture list: each is outside the grammar for a different reason.
        let bad = [
            "b == b",         // label on the right-hand side
            "'b1' == b",      // literal on the left-hand side
            "b",              // bare label
            "a b",            // trailing garbage
            "!",              // dangling negation
            r#"foo == "bar" &"#,
            r#"foo == "bar" |"#,
            r#""FOO"#,
            r#""FOO'"#,
            "'FOO",
            "(",
            ")",
            "()",
            "%",
        ];
        for sel in bad {
            assert!(parse_node(sel).is_err(), "expected rejection of {sel:?}");
        }
    }

    #[test]
    fn error_positions_point_at_offending_token() {
        let err = parse_node("a b").expect_err("should fail");
        assert_eq!(err.pos, 0);

        let err = parse_node(r#"a == "b" c"#).expect_err("should fail");
        assert_eq!(err.pos, 9);

        let err = parse_node("(has(a)").expect_err("should fail");
        assert_eq!(err.pos, 7);
    }

    #[test]
    fn deep_negation_chains_parse() {
        let node = parse_node("!!! has(a)").expect("parse");
        assert_eq!(
            node,
            Node::Not(Box::new(Node::Not(Box::new(Node::Not(Box::new(
                Node::Has {
                    key: "a".to_string()
                }
            ))))))
        );
    }
}
