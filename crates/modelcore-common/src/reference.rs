//! The reference-name grammar (`spec.md` §3.3/§6.3).
//!
//! Reference names are small, regular tokens: a single-letter prefix from
//! `VSCTIFLRM`, a numeric id, and an optional dotted subscript chain, or the
//! `T.*` time-constant family. This module owns parsing a reference string
//! into its structural parts and re-assembling it, so the graph, the
//! interpreter, and the reference-map builder share one definition of "what a
//! reference looks like" instead of each re-deriving the regex in `spec.md`
//! §6.3.

use std::fmt;

/// The one-letter family a reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefPrefix {
    /// `V{g}` — values-mode input-group subtotal.
    Values,
    /// `S{g}` — series-mode input-group subtotal.
    Series,
    /// `C{g}` — constants group.
    Constants,
    /// `L{g}` — lookup group.
    Lookup,
    /// `F{kp}` — key-period active flag.
    Flag,
    /// `I{idx}` — indexation curve.
    Indexation,
    /// `R{n}` — calculation output.
    Calc,
    /// `M{idx}` — module output.
    Module,
}

impl RefPrefix {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'V' => Some(Self::Values),
            'S' => Some(Self::Series),
            'C' => Some(Self::Constants),
            'L' => Some(Self::Lookup),
            'F' => Some(Self::Flag),
            'I' => Some(Self::Indexation),
            'R' => Some(Self::Calc),
            'M' => Some(Self::Module),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Values => 'V',
            Self::Series => 'S',
            Self::Constants => 'C',
            Self::Lookup => 'L',
            Self::Flag => 'F',
            Self::Indexation => 'I',
            Self::Calc => 'R',
            Self::Module => 'M',
        }
    }
}

/// A fully parsed reference token, e.g. `L3.2.1` or `F7.Start`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// `T.MiY`, `T.DiM`, ... — fixed time constants; no numeric id.
    TimeConstant(String),
    /// Everything else: a prefix, a leading id, and a dotted subscript chain
    /// (which may end in a literal word like `Start`/`End`).
    Tagged {
        prefix: RefPrefix,
        id: u32,
        subscripts: Vec<String>,
    },
}

impl Reference {
    /// Parse a single reference token. Returns `None` for anything that does
    /// not match the grammar in `spec.md` §6.3 (the caller then treats the
    /// token as an ordinary identifier/number, or as unresolved).
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(rest) = token.strip_prefix("T.") {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic()) {
                return Some(Reference::TimeConstant(rest.to_string()));
            }
            return None;
        }

        let mut chars = token.chars();
        let prefix = RefPrefix::from_char(chars.next()?)?;
        let rest = chars.as_str();

        let mut parts = rest.split('.');
        let id_str = parts.next()?;
        if id_str.is_empty() || !id_str.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let id: u32 = id_str.parse().ok()?;

        let subscripts: Vec<String> = parts.map(|s| s.to_string()).collect();
        for s in &subscripts {
            if s.is_empty() {
                return None;
            }
        }

        Some(Reference::Tagged {
            prefix,
            id,
            subscripts,
        })
    }

    /// The node name a reference's *owning calculation/module* would be
    /// scheduled under — i.e. strip subscripts, keep `R{id}`/`M{idx}`.
    pub fn node_name(&self) -> Option<String> {
        match self {
            Reference::Tagged {
                prefix: RefPrefix::Calc,
                id,
                ..
            } => Some(format!("R{id}")),
            Reference::Tagged {
                prefix: RefPrefix::Module,
                id,
                ..
            } => Some(format!("M{id}")),
            _ => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::TimeConstant(name) => write!(f, "T.{name}"),
            Reference::Tagged {
                prefix,
                id,
                subscripts,
            } => {
                write!(f, "{}{id}", prefix.as_char())?;
                for s in subscripts {
                    write!(f, ".{s}")?;
                }
                Ok(())
            }
        }
    }
}

/// The regex named in `spec.md` §6.3, as a literal pattern string (kept as
/// documentation / for callers who want a `regex::Regex` without linking
/// against this crate's hand-written tokenizer logic).
pub const REFERENCE_PATTERN: &str =
    r"\b([VSCTIFLRM]\d+(?:\.\d+)*(?:\.(Start|End|M|Q|Y))?|T\.[A-Za-z]+)\b";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calc_ref() {
        assert_eq!(
            Reference::parse("R84"),
            Some(Reference::Tagged {
                prefix: RefPrefix::Calc,
                id: 84,
                subscripts: vec![]
            })
        );
    }

    #[test]
    fn parses_dotted_lookup_ref() {
        let r = Reference::parse("L3.2.1").unwrap();
        assert_eq!(
            r,
            Reference::Tagged {
                prefix: RefPrefix::Lookup,
                id: 3,
                subscripts: vec!["2".to_string(), "1".to_string()]
            }
        );
        assert_eq!(r.to_string(), "L3.2.1");
    }

    #[test]
    fn parses_flag_start_end() {
        assert!(Reference::parse("F7.Start").is_some());
        assert!(Reference::parse("F7.End").is_some());
    }

    #[test]
    fn parses_time_constant() {
        assert_eq!(
            Reference::parse("T.MiY"),
            Some(Reference::TimeConstant("MiY".to_string()))
        );
    }

    #[test]
    fn rejects_non_reference() {
        assert!(Reference::parse("hello").is_none());
        assert!(Reference::parse("X12").is_none());
        assert!(Reference::parse("R").is_none());
    }

    #[test]
    fn node_name_for_module_output() {
        // The owning module's scheduling node strips the output subscript —
        // `M2.3` (output 3 of module 2) schedules under `M2`.
        let r = Reference::parse("M2.3").unwrap();
        assert_eq!(r.node_name(), Some("M2".to_string()));
    }
}
