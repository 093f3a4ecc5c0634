//! Typed representation of a single bound value.
//!
//! A [`Term`] is one value bound to a variable in a query result: a
//! resource identifier, a literal (optionally tagged with a datatype or
//! language), or an anonymous node. Terms are constructed by the
//! evaluation engine when a value is bound and are immutable thereafter.

/// A single bound value in a query result row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A resource identifier (e.g. an IRI such as `urn:example:s`).
    Identifier(String),
    /// A literal value with optional datatype and language tags.
    ///
    /// The variant determines which optional fields are meaningful: only
    /// literals carry them, and at most one of the two is conventionally
    /// set (the codec preserves whatever combination is present).
    Literal {
        /// The lexical form of the value.
        value: String,
        /// Optional datatype tag (e.g. `"integer"`).
        datatype: Option<String>,
        /// Optional language tag (e.g. `"en"`).
        language: Option<String>,
    },
    /// An anonymous (blank) node, identified by a scope-local label.
    AnonymousNode(String),
}

/// Discriminant of a [`Term`], used as the wire-format kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    /// [`Term::Identifier`].
    Identifier,
    /// [`Term::Literal`].
    Literal,
    /// [`Term::AnonymousNode`].
    AnonymousNode,
}

impl Term {
    /// Creates an identifier term.
    #[must_use]
    pub fn identifier(value: impl Into<String>) -> Self {
        Self::Identifier(value.into())
    }

    /// Creates a plain literal with no datatype or language tag.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Creates a literal tagged with a datatype.
    #[must_use]
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Creates a literal tagged with a language.
    #[must_use]
    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Creates an anonymous node term.
    #[must_use]
    pub fn anonymous(label: impl Into<String>) -> Self {
        Self::AnonymousNode(label.into())
    }

    /// Returns the term's kind discriminant.
    #[must_use]
    pub fn kind(&self) -> TermKind {
        match self {
            Self::Identifier(_) => TermKind::Identifier,
            Self::Literal { .. } => TermKind::Literal,
            Self::AnonymousNode(_) => TermKind::AnonymousNode,
        }
    }

    /// Returns the lexical form of the term.
    #[must_use]
    pub fn lexical_value(&self) -> &str {
        match self {
            Self::Identifier(v) | Self::AnonymousNode(v) => v,
            Self::Literal { value, .. } => value,
        }
    }
}

impl std::fmt::Display for TermKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identifier => "identifier",
            Self::Literal => "literal",
            Self::AnonymousNode => "anonymous-node",
        };
        f.write_str(s)
    }
}
