//! `Hook`: a declaration of one facet a `SubsystemBuilder` should construct,
//! plus the kinds it depends on (§4.3, "dependency-ordered build").

use crate::facet::Facet;
use std::sync::Arc;

/// Builds a fresh facet instance. Takes no arguments — a hook closure closes
/// over whatever constructor parameters it needs (queue capacity, a route
/// table seed, …) at registration time. Construction itself never fails;
/// failures surface later, from `init`.
pub type HookFactory = Arc<dyn Fn() -> Arc<dyn Facet> + Send + Sync>;

/// One entry in a `SubsystemBuilder`'s hook list.
///
/// `required` names the kinds this hook's facet depends on — the builder
/// topologically sorts hooks by this before constructing anything, so a
/// `processor` hook that requires `"queue"` and `"router"` is guaranteed
/// those facets already exist (and are initialized) by the time its own
/// `init` runs.
#[derive(Clone)]
pub struct Hook {
    pub kind: &'static str,
    pub source: String,
    pub required: Vec<&'static str>,
    pub factory: HookFactory,
}

impl Hook {
    pub fn new(kind: &'static str, source: impl Into<String>, factory: HookFactory) -> Self {
        Self {
            kind,
            source: source.into(),
            required: Vec::new(),
            factory,
        }
    }

    pub fn requiring(mut self, required: Vec<&'static str>) -> Self {
        self.required = required;
        self
    }

    /// A deterministic fingerprint of this hook's shape, used as part of the
    /// `DependencyGraphCache` key — two hook lists with the same
    /// (kind, source, sorted-required) tuples for every entry are
    /// interchangeable as far as planning is concerned, even if their
    /// factory closures are distinct instances.
    pub fn signature(&self) -> String {
        let mut required = self.required.to_vec();
        required.sort_unstable();
        format!("{}:{}:[{}]", self.kind, self.source, required.join(","))
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("required", &self.required)
            .finish()
    }
}

/// An ordered collection of hooks, as registered on a builder before a plan
/// is computed.
#[derive(Clone, Debug, Default)]
pub struct HookList {
    hooks: Vec<Hook>,
}

impl HookList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hook> {
        self.hooks.iter()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Cache key for the whole list: the per-hook signatures in
    /// *registration order* concatenated, since plan caching (§4.3) treats
    /// a hook list as the same plan input only if both its membership and
    /// its dependency shape match — insertion order itself only matters as
    /// a topological-sort tie-break, not for cache identity.
    pub fn cache_key(&self) -> String {
        let mut signatures: Vec<String> = self.hooks.iter().map(Hook::signature).collect();
        signatures.sort_unstable();
        signatures.join("|")
    }
}

impl<'a> IntoIterator for &'a HookList {
    type Item = &'a Hook;
    type IntoIter = std::slice::Iter<'a, Hook>;

    fn into_iter(self) -> Self::IntoIter {
        self.hooks.iter()
    }
}
