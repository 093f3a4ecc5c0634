//! One result row of a continuous query.
//!
//! A [`BindingSet`] is an ordered mapping from variable name to [`Term`],
//! tagged with a visibility label that downstream consumers are required
//! to honor. Insertion order is preserved because consumers may rely on
//! positional decoding; variable names are unique within one set.
//!
//! Arity is independent per message: no two binding sets on the same
//! topic are required to share a schema.

use crate::term::Term;

/// An ordered set of variable bindings plus a visibility label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    /// `(variable name, term)` pairs in insertion order.
    pairs: Vec<(String, Term)>,
    /// Opaque access-control expression. Empty means unrestricted.
    visibility: String,
}

impl BindingSet {
    /// Creates an empty, unrestricted binding set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty binding set with the given visibility label.
    #[must_use]
    pub fn with_visibility(visibility: impl Into<String>) -> Self {
        Self {
            pairs: Vec::new(),
            visibility: visibility.into(),
        }
    }

    /// Binds `term` to `name`.
    ///
    /// If the variable is already bound, its term is replaced in place
    /// (keeping the original position) and the previous term is returned.
    pub fn insert(&mut self, name: impl Into<String>, term: Term) -> Option<Term> {
        let name = name.into();
        if let Some(slot) = self.pairs.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(&mut slot.1, term));
        }
        self.pairs.push((name, term));
        None
    }

    /// Returns the term bound to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.pairs
            .iter()
            .find_map(|(n, t)| (n == name).then_some(t))
    }

    /// Iterates over `(name, term)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.pairs.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Returns the variable names in insertion order.
    #[must_use]
    pub fn variable_names(&self) -> Vec<&str> {
        self.pairs.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns the arity (number of bound variables).
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns whether no variables are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the visibility label. Empty means unrestricted.
    #[must_use]
    pub fn visibility(&self) -> &str {
        &self.visibility
    }

    /// Replaces the visibility label.
    pub fn set_visibility(&mut self, visibility: impl Into<String>) {
        self.visibility = visibility.into();
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = (&'a str, &'a Term);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, Term)>,
        fn(&'a (String, Term)) -> (&'a str, &'a Term),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter().map(|(n, t)| (n.as_str(), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let bindings = BindingSet::new();
        assert!(bindings.is_empty());
        assert_eq!(bindings.len(), 0);
        assert_eq!(bindings.visibility(), "");
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut bindings = BindingSet::new();
        bindings.insert("y", Term::literal("2"));
        bindings.insert("x", Term::literal("1"));
        bindings.insert("z", Term::literal("3"));

        assert_eq!(bindings.variable_names(), vec!["y", "x", "z"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut bindings = BindingSet::new();
        bindings.insert("x", Term::literal("old"));
        bindings.insert("y", Term::literal("2"));

        let previous = bindings.insert("x", Term::literal("new"));
        assert_eq!(previous, Some(Term::literal("old")));
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.variable_names(), vec!["x", "y"]);
        assert_eq!(bindings.get("x"), Some(&Term::literal("new")));
    }

    #[test]
    fn test_get_missing() {
        let bindings = BindingSet::new();
        assert!(bindings.get("x").is_none());
    }

    #[test]
    fn test_visibility() {
        let mut bindings = BindingSet::with_visibility("A&B");
        assert_eq!(bindings.visibility(), "A&B");

        bindings.set_visibility("");
        assert_eq!(bindings.visibility(), "");
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let mut a = BindingSet::new();
        a.insert("x", Term::literal("1"));
        a.insert("y", Term::literal("2"));

        let mut b = BindingSet::new();
        b.insert("y", Term::literal("2"));
        b.insert("x", Term::literal("1"));

        assert_ne!(a, b);
    }

    #[test]
    fn test_iter() {
        let mut bindings = BindingSet::new();
        bindings.insert("x", Term::identifier("urn:example:s"));
        bindings.insert("y", Term::typed_literal("42", "integer"));

        let collected: Vec<_> = bindings.iter().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].0, "x");
        assert_eq!(collected[1].0, "y");
    }
}
