//! CQL fragment model
//!
//! Immutable representations of identifiers, external fields and parsed
//! clause fragments, with rendering rules for the internal (always
//! quoted, protocol safe) and user display forms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mapping spec spelling of the TTL pseudo-column
pub const TTL_PSEUDO_COLUMN: &str = "__ttl";
/// Mapping spec spelling of the write-timestamp pseudo-column
pub const WRITETIME_PSEUDO_COLUMN: &str = "__timestamp";
/// Bound variable name used for per-record TTL values
pub const TTL_VARNAME: &str = "[ttl]";
/// Bound variable name used for per-record write timestamps
pub const WRITETIME_VARNAME: &str = "[timestamp]";

/// An internal-form CQL identifier (column or bound variable name).
///
/// Two identifiers are equal iff their canonical (unquoted, case
/// preserved) forms match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CqlIdentifier(String);

impl CqlIdentifier {
    /// Create an identifier from its exact internal form
    pub fn from_internal(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Create an identifier from user input.
    ///
    /// Double-quoted input is unescaped; unquoted input is lower-cased,
    /// following CQL identifier rules.
    pub fn from_user_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            let inner = &trimmed[1..trimmed.len() - 1];
            Self(inner.replace("\"\"", "\""))
        } else {
            Self(trimmed.to_lowercase())
        }
    }

    /// The canonical internal form
    pub fn as_internal(&self) -> &str {
        &self.0
    }

    /// Render in always-quoted, protocol-safe form
    pub fn as_cql(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }

    /// Render for user display: unquoted when quoting is unnecessary
    pub fn as_display(&self) -> String {
        if self.needs_quoting() {
            self.as_cql()
        } else {
            self.0.clone()
        }
    }

    fn needs_quoting(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c == '_' => {}
            _ => return true,
        }
        !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

impl fmt::Display for CqlIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// An external-side field identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// Field addressed by its position in the record
    Indexed(usize),
    /// Field addressed by name
    Named(String),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Indexed(i) => write!(f, "{}", i),
            Field::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A CQL function call fragment, e.g. `now()` or `max(c1, c2)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: CqlIdentifier,
    /// Raw argument texts, in call order
    pub args: Vec<String>,
}

impl FunctionCall {
    pub fn new(name: CqlIdentifier, args: Vec<String>) -> Self {
        Self { name, args }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name.as_display(), self.args.join(", "))
    }
}

/// A parsed clause fragment appearing on the database side of a mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CqlFragment {
    /// A plain column or bound variable
    Column(CqlIdentifier),
    /// A function call selector or generated value
    Function(FunctionCall),
    /// The synthetic time-to-live pseudo-column
    Ttl,
    /// The synthetic write-timestamp pseudo-column
    Writetime,
}

impl CqlFragment {
    /// The bound variable identifier this fragment binds to, if any.
    ///
    /// Function calls on the record side never bind; as selectors they
    /// are addressed by their display text as a synthetic identifier.
    pub fn variable(&self) -> CqlIdentifier {
        match self {
            CqlFragment::Column(id) => id.clone(),
            CqlFragment::Function(call) => CqlIdentifier::from_internal(call.to_string()),
            CqlFragment::Ttl => CqlIdentifier::from_internal(TTL_VARNAME),
            CqlFragment::Writetime => CqlIdentifier::from_internal(WRITETIME_VARNAME),
        }
    }

    /// Check if this fragment is a function call
    pub fn is_function(&self) -> bool {
        matches!(self, CqlFragment::Function(_))
    }

    /// Check if this fragment is one of the write-time pseudo-columns
    pub fn is_pseudo_column(&self) -> bool {
        matches!(self, CqlFragment::Ttl | CqlFragment::Writetime)
    }
}

impl fmt::Display for CqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlFragment::Column(id) => write!(f, "{}", id),
            CqlFragment::Function(call) => write!(f, "{}", call),
            CqlFragment::Ttl => write!(f, "{}", TTL_PSEUDO_COLUMN),
            CqlFragment::Writetime => write!(f, "{}", WRITETIME_PSEUDO_COLUMN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_from_user_input() {
        assert_eq!(
            CqlIdentifier::from_user_input("MyCol").as_internal(),
            "mycol"
        );
        assert_eq!(
            CqlIdentifier::from_user_input("\"My Col\"").as_internal(),
            "My Col"
        );
        assert_eq!(
            CqlIdentifier::from_user_input("\"a\"\"b\"").as_internal(),
            "a\"b"
        );
    }

    #[test]
    fn test_identifier_equality_by_internal_form() {
        assert_eq!(
            CqlIdentifier::from_user_input("c1"),
            CqlIdentifier::from_internal("c1")
        );
        assert_ne!(
            CqlIdentifier::from_user_input("\"C1\""),
            CqlIdentifier::from_internal("c1")
        );
    }

    #[test]
    fn test_identifier_rendering() {
        let plain = CqlIdentifier::from_internal("c1");
        assert_eq!(plain.as_cql(), "\"c1\"");
        assert_eq!(plain.as_display(), "c1");

        let spaced = CqlIdentifier::from_internal("COL 2");
        assert_eq!(spaced.as_cql(), "\"COL 2\"");
        assert_eq!(spaced.as_display(), "\"COL 2\"");

        let quoted = CqlIdentifier::from_internal("a\"b");
        assert_eq!(quoted.as_cql(), "\"a\"\"b\"");
    }

    #[test]
    fn test_fragment_variables() {
        assert_eq!(CqlFragment::Ttl.variable().as_internal(), TTL_VARNAME);
        assert_eq!(
            CqlFragment::Writetime.variable().as_internal(),
            WRITETIME_VARNAME
        );
        let call = FunctionCall::new(CqlIdentifier::from_internal("now"), vec![]);
        assert_eq!(
            CqlFragment::Function(call).variable().as_internal(),
            "now()"
        );
    }
}
