use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Set of scope identifiers negotiated between a client and a subject.
///
/// Backed by an ordered set so iteration order is deterministic in logs
/// and tests. The empty set is the identity element for [`merge`].
///
/// Parsing splits the raw scope string on single spaces, so empty tokens
/// are kept: `Scopes::from_space_delimited("")` is the singleton set
/// `{""}`, which matches only itself.
///
/// [`merge`]: Scopes::merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scopes(BTreeSet<String>);

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `scope` query value.
    pub fn from_space_delimited(raw: &str) -> Self {
        raw.split(' ').map(str::to_owned).collect()
    }

    /// Build a set from the scope list of an RPC request.
    pub fn from_slice(scopes: &[String]) -> Self {
        scopes.iter().cloned().collect()
    }

    /// True when every scope in `other` is present in `self`.
    pub fn has_all(&self, other: &Scopes) -> bool {
        other.0.iter().all(|scope| self.0.contains(scope))
    }

    /// Scopes present in `self` but absent from `other`.
    pub fn diff(&self, other: &Scopes) -> Scopes {
        Scopes(self.0.difference(&other.0).cloned().collect())
    }

    /// Union of both sets.
    pub fn merge(&self, other: &Scopes) -> Scopes {
        Scopes(self.0.union(&other.0).cloned().collect())
    }

    /// Scopes present in both sets.
    pub fn intersect(&self, other: &Scopes) -> Scopes {
        Scopes(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Render back into the wire format of the `scope` parameter.
    pub fn to_space_delimited(&self) -> String {
        self.to_vec().join(" ")
    }
}

impl FromIterator<String> for Scopes {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Scopes(iter.into_iter().collect())
    }
}
