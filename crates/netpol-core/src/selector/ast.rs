//! Selector expression trees.
//!
//! A [`Node`] is one node of a parsed selector expression. The tree carries
//! its own canonical text form via [`Display`]: whitespace is normalised to
//! single spaces between tokens and none adjacent to brackets, redundant
//! outer parentheses are stripped, and literal-set members keep their source
//! order. Printing a tree and re-parsing the output yields an identical tree,
//! which is what makes the canonical text a stable identity for a selector.
//!
//! Evaluation is side-effect free and short-circuiting. The negative forms
//! (`!=`, `not in`) treat an absent label as a non-match of the positive
//! form, so they evaluate to `true` when the label is missing.

use std::collections::HashMap;
use std::fmt::{self, Display, Write};

/// One node of a selector expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `all()` — matches every label set, including the empty one.
    All,
    /// `has(key)` — the label is present, with any value.
    Has {
        /// Label name to test for presence.
        key: String,
    },
    /// `key == "value"`.
    Equal {
        /// Label name.
        key: String,
        /// Required value (byte comparison).
        value: String,
    },
    /// `key != "value"` — true when the label is absent.
    NotEqual {
        /// Label name.
        key: String,
        /// Excluded value.
        value: String,
    },
    /// `key in {"a", "b"}`.
    In {
        /// Label name.
        key: String,
        /// Accepted values, in source order.
        values: Vec<String>,
    },
    /// `key not in {"a", "b"}` — true when the label is absent.
    NotIn {
        /// Label name.
        key: String,
        /// Rejected values, in source order.
        values: Vec<String>,
    },
    /// `a && b`.
    And(Box<Node>, Box<Node>),
    /// `a || b`.
    Or(Box<Node>, Box<Node>),
    /// `!a`.
    Not(Box<Node>),
}

impl Node {
    /// Evaluates the expression against a label map.
    #[must_use]
    pub fn evaluate(&self, labels: &HashMap<String, String>) -> bool {
        match self {
            Node::All => true,
            Node::Has { key } => labels.contains_key(key),
            Node::Equal { key, value } => labels.get(key).is_some_and(|v| v == value),
            Node::NotEqual { key, value } => !labels.get(key).is_some_and(|v| v == value),
            Node::In { key, values } => labels.get(key).is_some_and(|v| values.contains(v)),
            Node::NotIn { key, values } => !labels.get(key).is_some_and(|v| values.contains(v)),
            Node::And(a, b) => a.evaluate(labels) && b.evaluate(labels),
            Node::Or(a, b) => a.evaluate(labels) || b.evaluate(labels),
            Node::Not(inner) => !inner.evaluate(labels),
        }
    }

    /// True for nodes that `!` must parenthesise: the binary combinators,
    /// and a chain of `!` that bottoms out in one.
    fn negation_needs_parens(&self) -> bool {
        match self {
            Node::And(..) | Node::Or(..) => true,
            Node::Not(inner) => inner.negation_needs_parens(),
            _ => false,
        }
    }
}

/// Quotes a literal for canonical output: double quotes unless the value
/// itself contains a double quote, in which case single quotes. Values
/// containing both quote characters are unrepresentable in the grammar (it
/// has no escape sequences) and cannot be produced by the parser.
fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if value.contains('"') {
        write!(f, "'{value}'")
    } else {
        write!(f, "\"{value}\"")
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, values: &[String]) -> fmt::Result {
    f.write_char('{')?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_quoted(f, v)?;
    }
    f.write_char('}')
}

impl Display for Node {
    /// Writes the canonical text form of the expression.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::All => f.write_str("all()"),
            Node::Has { key } => write!(f, "has({key})"),
            Node::Equal { key, value } => {
                write!(f, "{key} == ")?;
                write_quoted(f, value)
            },
            Node::NotEqual { key, value } => {
                write!(f, "{key} != ")?;
                write_quoted(f, value)
            },
            Node::In { key, values } => {
                write!(f, "{key} in ")?;
                write_set(f, values)
            },
            Node::NotIn { key, values } => {
                write!(f, "{key} not in ")?;
                write_set(f, values)
            },
            Node::And(a, b) => {
                for (i, side) in [a, b].into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(" && ")?;
                    }
                    // Only the lower-precedence combinator needs brackets.
                    if matches!(**side, Node::Or(..)) {
                        write!(f, "({side})")?;
                    } else {
                        write!(f, "{side}")?;
                    }
                }
                Ok(())
            },
            Node::Or(a, b) => write!(f, "{a} || {b}"),
            Node::Not(inner) => {
                if inner.negation_needs_parens() {
                    write!(f, "!({inner})")
                } else {
                    write!(f, "!{inner}")
                }
            },
        }
    }
}
