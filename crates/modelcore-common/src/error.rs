//! Engine error taxonomy.
//!
//! - **`EngineErrorKind`** — the canonical set of failure categories a pass
//!   can report (`spec.md` §6.4/§7).
//! - **`EngineError`**     — kind plus optional message/node context.
//!
//! No `EngineError` ever aborts `run_model`: every formula-level failure
//! collapses the offending period to `0.0` and is *optionally* recorded here
//! for the caller's `errors` side channel. `Result<_, EngineError>` is still
//! the right return type for genuinely fatal, whole-pass problems (an
//! unparsable model document, a missing calculation id referenced by a
//! module), which is why this type implements `std::error::Error`.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the four failure categories named in `spec.md` §6.4.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EngineErrorKind {
    /// Unbalanced parens, illegal characters, or an operator with no operand.
    MalformedFormula(String),
    /// A true cycle remained after SHIFT/PREVSUM/PREVVAL clustering.
    CircularDependency(Vec<String>),
    /// A reference token resolved to nothing; informational only — the
    /// formula still evaluates, with the token zero-filled.
    UnresolvedReference(String),
    /// The model document itself failed validation (duplicate ids, a module
    /// input that names a calculation that doesn't exist, etc).
    InvalidModel(String),
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFormula(text) => write!(f, "malformed formula: {text}"),
            Self::CircularDependency(nodes) => {
                write!(f, "circular dependency among nodes: {}", nodes.join(", "))
            }
            Self::UnresolvedReference(r) => write!(f, "unresolved reference: {r}"),
            Self::InvalidModel(msg) => write!(f, "invalid model: {msg}"),
        }
    }
}

/// A single reported error or warning, optionally tagged with the node
/// (`R{id}`/`M{idx}`) that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub node: Option<String>,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind) -> Self {
        Self { kind, node: None }
    }

    pub fn with_node<S: Into<String>>(mut self, node: S) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn malformed<S: Into<String>>(text: S) -> Self {
        Self::new(EngineErrorKind::MalformedFormula(text.into()))
    }

    pub fn unresolved<S: Into<String>>(reference: S) -> Self {
        Self::new(EngineErrorKind::UnresolvedReference(reference.into()))
    }

    pub fn circular(nodes: Vec<String>) -> Self {
        Self::new(EngineErrorKind::CircularDependency(nodes))
    }

    pub fn invalid_model<S: Into<String>>(msg: S) -> Self {
        Self::new(EngineErrorKind::InvalidModel(msg.into()))
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(node) = &self.node {
            write!(f, " (at {node})")?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}
