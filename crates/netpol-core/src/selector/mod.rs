//! Selector language: parser, canonical form, stable identifier, evaluator.
//!
//! A selector is a small boolean expression over endpoint labels:
//!
//! ```text
//! env == "prod" && has(role) && tier not in {"infra", "ops"}
//! ```
//!
//! [`Selector::parse`] turns selector text into a [`Selector`]: the parsed
//! expression tree plus its canonical text form and a stable content
//! identifier derived from it. Two selectors that mean the same thing modulo
//! whitespace and redundant parentheses share one canonical form and one
//! identifier, which is what the rest of the control plane keys on.
//!
//! # Unique identifiers
//!
//! The identifier is `"s:"` followed by the first 26 characters of the
//! URL-safe, unpadded base64 encoding of the SHA-224 digest of the canonical
//! text: 28 printable ASCII characters in total. The construction is
//! deliberately frozen; identifiers are compared across processes and
//! releases.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use netpol_core::selector::Selector;
//!
//! let sel = Selector::parse(r#" env == "prod" &&has( role )"#).unwrap();
//! assert_eq!(sel.to_string(), r#"env == "prod" && has(role)"#);
//!
//! let labels: HashMap<_, _> = [
//!     ("env".to_string(), "prod".to_string()),
//!     ("role".to_string(), "db".to_string()),
//! ]
//! .into();
//! assert!(sel.evaluate(&labels));
//! ```

mod ast;
mod lexer;
mod parser;

use std::collections::HashMap;
use std::fmt::{self, Display};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha224};
use thiserror::Error;

pub use ast::Node;

/// Prefix of every selector unique identifier.
pub const UID_PREFIX: &str = "s:";

/// Total length of a selector unique identifier, prefix included.
pub const UID_LEN: usize = 28;

/// A selector string was rejected by the grammar.
///
/// `pos` is a byte offset into the input. The empty selector is not an
/// error; it denotes [`Node::All`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("selector syntax error at offset {pos}: {msg}")]
pub struct ParseError {
    /// Byte offset of the offending character or token.
    pub pos: usize,
    /// Human-readable description of what went wrong.
    pub msg: String,
}

/// A parsed selector: expression tree, canonical text, unique identifier.
///
/// Construction goes through [`Selector::parse`] only, so every value holds
/// a tree the grammar can express; the canonical text and identifier are
/// computed once at construction.
#[derive(Debug, Clone)]
pub struct Selector {
    root: Node,
    canonical: String,
    uid: String,
}

impl Selector {
    /// Parses selector text.
    ///
    /// The empty and whitespace-only strings parse to the `all()` selector.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the input falls outside the grammar:
    /// unterminated string literals, unmatched parentheses, bare label
    /// names, literals on the left of a comparator, trailing boolean
    /// operators, or characters the grammar has no use for.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let root = parser::parse_node(input)?;
        let canonical = root.to_string();
        let uid = unique_id(&canonical);
        Ok(Self {
            root,
            canonical,
            uid,
        })
    }

    /// The parsed expression tree.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The canonical text form. Parsing it yields an equal selector.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// The stable content identifier of this selector.
    ///
    /// Equal canonical forms have equal identifiers, across processes and
    /// releases.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.uid
    }

    /// Evaluates the selector against a label map.
    #[must_use]
    pub fn evaluate(&self, labels: &HashMap<String, String>) -> bool {
        self.root.evaluate(labels)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Selector {}

fn unique_id(canonical: &str) -> String {
    let digest = Sha224::digest(canonical.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    format!("{UID_PREFIX}{}", &encoded[..UID_LEN - UID_PREFIX.len()])
}
