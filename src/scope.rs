//! Range-variable scope tracking.
//!
//! A [`ScopeStack`] is a stack of [`ScopeEntry`] values. The parser pushes
//! untyped entries so it can tell range variables from properties; the
//! binder pushes entries carrying the element type once it is known.
//! Lookups search innermost first, so an inner variable shadows an outer
//! one of the same name.

use crate::types::TypeRef;

/// Name of the implicit range variable for the current item.
pub const IMPLICIT_RANGE_VARIABLE: &str = "$it";

/// One active range variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    pub name: String,
    /// `None` while parsing; the collection element type while binding.
    pub element_type: Option<TypeRef>,
}

impl ScopeEntry {
    /// An entry whose type is not yet known.
    #[must_use]
    pub fn untyped(name: impl Into<String>) -> Self {
        ScopeEntry {
            name: name.into(),
            element_type: None,
        }
    }

    /// An entry bound to a model type.
    #[must_use]
    pub fn typed(name: impl Into<String>, element_type: TypeRef) -> Self {
        ScopeEntry {
            name: name.into(),
            element_type: Some(element_type),
        }
    }
}

/// Stack of range variables, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    entries: Vec<ScopeEntry>,
}

impl ScopeStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        ScopeStack {
            entries: Vec::new(),
        }
    }

    /// Creates a stack holding only `$it`, typed when `element_type` is given.
    #[must_use]
    pub fn with_implicit(element_type: Option<TypeRef>) -> Self {
        let mut stack = ScopeStack::new();
        stack.push(ScopeEntry {
            name: IMPLICIT_RANGE_VARIABLE.to_string(),
            element_type,
        });
        stack
    }

    /// Enters a new scope.
    pub fn push(&mut self, entry: ScopeEntry) {
        tracing::trace!(name = %entry.name, depth = self.entries.len() + 1, "push range variable");
        self.entries.push(entry);
    }

    /// Leaves the innermost scope.
    pub fn pop(&mut self) -> Option<ScopeEntry> {
        let entry = self.entries.pop();
        if let Some(ref entry) = entry {
            tracing::trace!(name = %entry.name, depth = self.entries.len(), "pop range variable");
        }
        entry
    }

    /// Finds the innermost entry named `name`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ScopeEntry> {
        self.entries.iter().rev().find(|entry| entry.name == name)
    }

    /// Returns true if `name` is an active range variable.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
