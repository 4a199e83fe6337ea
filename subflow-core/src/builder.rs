//! `SubsystemBuilder`: resolves the effective ctx and hook list into a
//! `Plan`, topologically sorting hooks by their `required` kinds and
//! constructing facets ready to hand to a `FacetManager` (§4.3).

use crate::contract::FacetContractRegistry;
use crate::ctx::SubsystemCtx;
use crate::error::SubflowError;
use crate::facet::Facet;
use crate::graph_cache::{CacheEntry, DependencyGraphCache};
use crate::hook::{Hook, HookList};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The result of a successful `plan()`: resolved configuration plus the
/// facets constructed in dependency order, ready to add to a manager.
#[derive(Clone)]
pub struct Plan {
    pub resolved_ctx: SubsystemCtx,
    pub ordered_kinds: Vec<&'static str>,
    pub facets_by_kind: Vec<(&'static str, Arc<dyn Facet>)>,
}

/// Resolves hooks and context overlays into a `Plan`.
///
/// One builder belongs to one Subsystem. `default_hooks` are the kinds a
/// Subsystem was constructed with; `user_hooks` are registered afterward via
/// `use_hook`/`use_hook_overwrite` and may overwrite a default of the same
/// kind only when explicitly marked.
pub struct SubsystemBuilder {
    base_ctx: SubsystemCtx,
    overlay: SubsystemCtx,
    default_hooks: HookList,
    user_hooks: Vec<(Hook, bool)>,
    contracts: FacetContractRegistry,
    cached_plan: Option<(String, Plan)>,
}

impl SubsystemBuilder {
    pub fn new(base_ctx: SubsystemCtx, default_hooks: HookList) -> Self {
        Self {
            base_ctx,
            overlay: SubsystemCtx::new(),
            default_hooks,
            user_hooks: Vec::new(),
            contracts: FacetContractRegistry::with_defaults(),
            cached_plan: None,
        }
    }

    pub fn with_contracts(mut self, contracts: FacetContractRegistry) -> Self {
        self.contracts = contracts;
        self
    }

    /// Deep-merge `patch` into the builder's ctx overlay. Invalidates the
    /// cached plan.
    pub fn with_ctx(&mut self, patch: &SubsystemCtx) -> &mut Self {
        self.overlay.merge(patch);
        self.invalidate();
        self
    }

    pub fn clear_ctx(&mut self) -> &mut Self {
        self.overlay = SubsystemCtx::new();
        self.invalidate();
        self
    }

    pub fn use_hook(&mut self, hook: Hook, overwrite: bool) -> &mut Self {
        self.user_hooks.push((hook, overwrite));
        self.invalidate();
        self
    }

    pub fn invalidate(&mut self) {
        self.cached_plan = None;
    }

    pub fn get_plan(&self) -> Option<&Plan> {
        self.cached_plan.as_ref().map(|(_, plan)| plan)
    }

    /// Alias for `plan`, for callers that want to compute a plan purely to
    /// inspect it without intending to `build()` right after.
    pub fn dry_run(&mut self, graph_cache: &mut DependencyGraphCache) -> Result<Plan, SubflowError> {
        self.plan(graph_cache)
    }

    /// Resolve ctx, merge hooks, topologically sort, construct facets,
    /// enforce contracts, and cache the result (§4.3).
    pub fn plan(&mut self, graph_cache: &mut DependencyGraphCache) -> Result<Plan, SubflowError> {
        let resolved_ctx = self.base_ctx.merged_with(&self.overlay);
        let merged_hooks = self.merge_hooks()?;
        let cache_key = merged_hooks.cache_key();

        if let Some((key, plan)) = &self.cached_plan {
            if *key == cache_key && plan.resolved_ctx == resolved_ctx {
                return Ok(plan.clone());
            }
        }

        let order = match graph_cache.get(&cache_key) {
            Some(CacheEntry::Valid(order)) => order,
            Some(CacheEntry::Invalid(error)) => return Err(SubflowError::validation(error)),
            None => match topological_sort(&merged_hooks) {
                Ok(order) => {
                    graph_cache.set(cache_key.clone(), CacheEntry::Valid(order.clone()));
                    order
                }
                Err(err) => {
                    graph_cache.set(cache_key.clone(), CacheEntry::Invalid(err.to_string()));
                    return Err(err);
                }
            },
        };

        let hooks_by_kind: HashMap<&'static str, &Hook> =
            merged_hooks.iter().map(|hook| (hook.kind, hook)).collect();
        let mut ordered_kinds = Vec::with_capacity(order.len());
        let mut facets_by_kind = Vec::with_capacity(order.len());

        for kind in &order {
            let hook = hooks_by_kind[kind];
            let facet = (hook.factory)();
            self.contracts
                .enforce(facet.as_ref())
                .map_err(|msg| SubflowError::validation(format!("contract '{}': {msg}", hook.kind)))?;
            ordered_kinds.push(hook.kind);
            facets_by_kind.push((hook.kind, facet));
        }

        let plan = Plan {
            resolved_ctx,
            ordered_kinds,
            facets_by_kind,
        };
        self.cached_plan = Some((cache_key, plan.clone()));
        debug!(kinds = ?plan.ordered_kinds, "plan computed");
        Ok(plan)
    }

    /// `defaultHooks ⊕ userHooks`: a later hook of the same kind overwrites
    /// an earlier one only if it was registered with `overwrite=true`,
    /// otherwise registering a duplicate kind is a validation error.
    fn merge_hooks(&self) -> Result<HookList, SubflowError> {
        let mut merged: Vec<Hook> = self.default_hooks.iter().cloned().collect();

        for (hook, overwrite) in &self.user_hooks {
            if let Some(pos) = merged.iter().position(|h| h.kind == hook.kind) {
                if *overwrite {
                    merged[pos] = hook.clone();
                    continue;
                }
                return Err(SubflowError::validation(format!(
                    "duplicate hook kind '{}' already exists",
                    hook.kind
                )));
            }
            merged.push(hook.clone());
        }

        let mut list = HookList::new();
        for hook in merged {
            list.push(hook);
        }
        Ok(list)
    }
}

/// Kahn's algorithm over the `required` relation, tie-broken by insertion
/// order: among hooks with no remaining unmet dependency, the one
/// registered earliest is placed first.
///
/// Returns kind strings rather than positions into `hooks`: the result is
/// cached under a signature that is independent of hook-registration order
/// (`HookList::cache_key`), so a second builder with the same hook *set* but
/// a different registration order must still be able to look its own hooks
/// up by kind rather than by a position borrowed from whichever builder
/// computed the order first (§3, §5).
fn topological_sort(hooks: &HookList) -> Result<Vec<&'static str>, SubflowError> {
    let entries: Vec<&Hook> = hooks.iter().collect();
    let kind_to_idx: HashMap<&'static str, usize> =
        entries.iter().enumerate().map(|(i, h)| (h.kind, i)).collect();

    for hook in &entries {
        for required in &hook.required {
            if !kind_to_idx.contains_key(required) {
                return Err(SubflowError::dependency(format!(
                    "hook '{}' requires unknown kind '{}'",
                    hook.kind, required
                )));
            }
        }
    }

    let mut in_degree: Vec<usize> = entries.iter().map(|h| h.required.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
    for (i, hook) in entries.iter().enumerate() {
        for required in &hook.required {
            dependents[kind_to_idx[required]].push(i);
        }
    }

    let mut ready: Vec<usize> = (0..entries.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(entries.len());

    while !ready.is_empty() {
        ready.sort_unstable();
        let idx = ready.remove(0);
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() != entries.len() {
        let remaining: Vec<String> = (0..entries.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| entries[i].kind.to_string())
            .collect();
        return Err(SubflowError::validation(format!(
            "dependency cycle among hooks: {}",
            remaining.join(", ")
        )));
    }

    Ok(order.into_iter().map(|i| entries[i].kind).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetInitCtx;
    use async_trait::async_trait;
    use std::any::Any;

    struct Stub(&'static str);

    #[async_trait]
    impl Facet for Stub {
        fn kind(&self) -> &'static str {
            self.0
        }
        fn source(&self) -> &str {
            "test"
        }
        fn is_initialized(&self) -> bool {
            false
        }
        fn is_disposed(&self) -> bool {
            false
        }
        async fn init(&self, _: &FacetInitCtx<'_>) -> Result<(), SubflowError> {
            Ok(())
        }
        async fn dispose(&self) -> Result<(), SubflowError> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn hook(kind: &'static str, required: Vec<&'static str>) -> Hook {
        Hook::new(kind, "test", Arc::new(move || Arc::new(Stub(kind)) as Arc<dyn Facet>)).requiring(required)
    }

    #[test]
    fn sorts_dependencies_before_dependents() {
        let mut list = HookList::new();
        list.push(hook("processor", vec!["queue", "router"]));
        list.push(hook("queue", vec![]));
        list.push(hook("router", vec![]));

        let order = topological_sort(&list).unwrap();
        assert_eq!(order, vec!["queue", "router", "processor"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut list = HookList::new();
        list.push(hook("a", vec!["b"]));
        list.push(hook("b", vec!["a"]));
        let err = topological_sort(&list).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn duplicate_kind_without_overwrite_is_rejected() {
        let mut defaults = HookList::new();
        defaults.push(hook("queue", vec![]));
        let mut builder = SubsystemBuilder::new(SubsystemCtx::new(), defaults);
        builder.use_hook(hook("queue", vec![]), false);
        let mut cache = DependencyGraphCache::new();
        let err = builder.plan(&mut cache).unwrap_err();
        assert!(err.to_string().contains("duplicate hook kind"));
    }

    /// Two builders sharing one graph cache, with the same hook *set* but
    /// registered in a different order, collide on the same order-independent
    /// cache key — the cached order must still resolve correctly for both,
    /// since it is looked up by kind rather than by the position it held in
    /// whichever builder computed it first.
    #[test]
    fn cached_order_is_correct_regardless_of_registration_order() {
        let mut cache = DependencyGraphCache::new();

        let mut first_defaults = HookList::new();
        first_defaults.push(hook("queue", vec![]));
        first_defaults.push(hook("router", vec![]));
        first_defaults.push(hook("processor", vec!["queue", "router"]));
        let mut first = SubsystemBuilder::new(SubsystemCtx::new(), first_defaults);
        let first_plan = first.plan(&mut cache).unwrap();
        assert_eq!(first_plan.ordered_kinds, vec!["queue", "router", "processor"]);

        let mut second_defaults = HookList::new();
        second_defaults.push(hook("router", vec![]));
        second_defaults.push(hook("processor", vec!["queue", "router"]));
        second_defaults.push(hook("queue", vec![]));
        let mut second = SubsystemBuilder::new(SubsystemCtx::new(), second_defaults);
        let second_plan = second.plan(&mut cache).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(second_plan.ordered_kinds, vec!["queue", "router", "processor"]);
        let processor_pos = second_plan
            .ordered_kinds
            .iter()
            .position(|k| *k == "processor")
            .unwrap();
        let queue_pos = second_plan.ordered_kinds.iter().position(|k| *k == "queue").unwrap();
        let router_pos = second_plan.ordered_kinds.iter().position(|k| *k == "router").unwrap();
        assert!(queue_pos < processor_pos);
        assert!(router_pos < processor_pos);
    }

    #[test]
    fn cycle_error_is_cached_and_replayed_without_recomputing() {
        let mut defaults = HookList::new();
        defaults.push(hook("a", vec!["b"]));
        defaults.push(hook("b", vec!["a"]));
        let mut cache = DependencyGraphCache::new();

        let mut builder = SubsystemBuilder::new(SubsystemCtx::new(), defaults);
        let err = builder.plan(&mut cache).unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert_eq!(cache.len(), 1);

        builder.invalidate();
        let err = builder.plan(&mut cache).unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert_eq!(cache.len(), 1);
    }
}
