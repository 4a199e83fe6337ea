//! `Subsystem`: a node in the dispatch tree. Owns a `FacetManager`, a
//! `SubsystemBuilder`, lifecycle callbacks, and its place in the parent/child
//! tree (§4.4).

use crate::builder::SubsystemBuilder;
use crate::ctx::SubsystemCtx;
use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx};
use crate::graph_cache::DependencyGraphCache;
use crate::hook::{Hook, HookList};
use crate::manager::{AddOptions, FacetManager};
use crate::message::{DispatchOptions, DispatchResult, Message, MessagePair};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

pub type LifecycleCallback = Arc<dyn Fn(&Subsystem, &SubsystemCtx) + Send + Sync>;

struct BuildState {
    result: Option<Result<(), SubflowError>>,
}

/// A node in the Subsystem tree.
///
/// Parent is a non-owning back-reference (`Weak`); children are owned
/// exclusively by their parent (§9, "Cyclic parent/child references"). All
/// interior state that build/dispose mutate lives behind `tokio::sync::Mutex`
/// so that the single logical "cooperative mailbox" per Subsystem (§5) is
/// expressed as lock-holding rather than true parallelism.
pub struct Subsystem {
    name: String,
    builder: Mutex<SubsystemBuilder>,
    manager: Mutex<FacetManager>,
    build_state: Mutex<BuildState>,
    is_built: AtomicBool,
    disposed: AtomicBool,
    parent: RwLock<Option<Weak<Subsystem>>>,
    children: RwLock<Vec<Arc<Subsystem>>>,
    on_init: Mutex<Vec<LifecycleCallback>>,
    on_dispose: Mutex<Vec<LifecycleCallback>>,
    core_processor: RwLock<Option<Arc<dyn Facet>>>,
    graph_cache: Arc<Mutex<DependencyGraphCache>>,
    error_sink: RwLock<Option<Arc<dyn Fn(&str) + Send + Sync>>>,
}

impl Subsystem {
    pub fn new(name: impl Into<String>, ctx: SubsystemCtx, default_hooks: HookList) -> Result<Arc<Self>, SubflowError> {
        Self::with_graph_cache(name, ctx, default_hooks, Arc::new(Mutex::new(DependencyGraphCache::new())))
    }

    pub fn with_graph_cache(
        name: impl Into<String>,
        ctx: SubsystemCtx,
        default_hooks: HookList,
        graph_cache: Arc<Mutex<DependencyGraphCache>>,
    ) -> Result<Arc<Self>, SubflowError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SubflowError::validation("subsystem name must be non-empty"));
        }
        Ok(Arc::new(Self {
            name,
            builder: Mutex::new(SubsystemBuilder::new(ctx, default_hooks)),
            manager: Mutex::new(FacetManager::new()),
            build_state: Mutex::new(BuildState { result: None }),
            is_built: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            parent: RwLock::new(None),
            children: RwLock::new(Vec::new()),
            on_init: Mutex::new(Vec::new()),
            on_dispose: Mutex::new(Vec::new()),
            core_processor: RwLock::new(None),
            graph_cache,
            error_sink: RwLock::new(None),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs the best-effort error channel a processor facet forwards
    /// handler failures to (§4.5, step 3; typically wired by a MessageSystem
    /// to its own `sendError`).
    pub fn set_error_sink(&self, sink: Arc<dyn Fn(&str) + Send + Sync>) {
        *self.error_sink.write().unwrap() = Some(sink);
    }

    pub fn notify_error(&self, message: &str) {
        if let Some(sink) = self.error_sink.read().unwrap().as_ref() {
            sink(message);
        }
    }

    pub fn is_built(&self) -> bool {
        self.is_built.load(Ordering::Acquire)
    }

    pub async fn use_hook(&self, hook: Hook, overwrite: bool) {
        self.builder.lock().await.use_hook(hook, overwrite);
    }

    pub async fn with_ctx(&self, patch: &SubsystemCtx) {
        self.builder.lock().await.with_ctx(patch);
    }

    pub async fn on_init(&self, callback: LifecycleCallback) {
        self.on_init.lock().await.push(callback);
    }

    pub async fn on_dispose(&self, callback: LifecycleCallback) {
        self.on_dispose.lock().await.push(callback);
    }

    pub async fn find(&self, kind: &str) -> Option<Arc<dyn Facet>> {
        self.manager.lock().await.find(kind)
    }

    /// Build this Subsystem and all its children. Idempotent and coalesced:
    /// concurrent callers serialize on `build_state`, and once a result is
    /// recorded every subsequent call returns it immediately (§4.4).
    #[instrument(level = "debug", skip(self), fields(subsystem = %self.name))]
    pub async fn build(self: &Arc<Self>) -> Result<(), SubflowError> {
        let mut state = self.build_state.lock().await;
        if let Some(result) = &state.result {
            return result.clone();
        }
        let result = self.build_inner().await;
        if result.is_ok() {
            self.is_built.store(true, Ordering::Release);
        }
        state.result = Some(result.clone());
        result
    }

    async fn build_inner(self: &Arc<Self>) -> Result<(), SubflowError> {
        let plan = {
            let mut graph_cache = self.graph_cache.lock().await;
            let mut builder = self.builder.lock().await;
            builder.plan(&mut graph_cache)?
        };

        let ctx = plan.resolved_ctx.clone();
        let init_ctx = FacetInitCtx {
            ctx: &ctx,
            subsystem_name: &self.name,
        };
        let opts = AddOptions {
            init: true,
            attach: true,
            overwrite: false,
        };

        {
            let mut manager = self.manager.lock().await;
            manager.add_many(plan.facets_by_kind.clone(), &init_ctx, opts).await?;
        }

        self.attach_host_to_dependent_facets().await;
        self.select_core_processor().await;

        for child in self.children.read().unwrap().iter() {
            Box::pin(child.build()).await?;
        }

        let callbacks = self.on_init.lock().await.clone();
        for callback in callbacks {
            callback(self, &ctx);
        }

        debug!("subsystem built");
        Ok(())
    }

    /// Wires the processor and queries facets (if present) back to this
    /// Subsystem so they can look up sibling facets at dispatch time.
    /// Plan-time factories never see this — it runs only after every facet
    /// in the plan has already been constructed and initialized.
    async fn attach_host_to_dependent_facets(self: &Arc<Self>) {
        use crate::facets::processor::ProcessorFacetImpl;
        use crate::facets::queries::QueriesFacetImpl;

        let manager = self.manager.lock().await;
        if let Some(facet) = manager.find("processor") {
            if let Some(processor) = facet.as_any().downcast_ref::<ProcessorFacetImpl>() {
                processor.attach_host(Arc::downgrade(self));
            }
        }
        if let Some(facet) = manager.find("queries") {
            if let Some(queries) = facet.as_any().downcast_ref::<QueriesFacetImpl>() {
                queries.attach_host(Arc::downgrade(self));
            }
        }
    }

    async fn select_core_processor(&self) {
        let manager = self.manager.lock().await;
        let chosen = manager.find("synchronous").or_else(|| manager.find("processor"));
        *self.core_processor.write().unwrap() = chosen;
    }

    /// Dispose this Subsystem: children first (reverse insertion order), then
    /// facets (reverse init order), then `onDispose` callbacks. Awaits an
    /// in-flight build before proceeding; a single dispose error is logged
    /// and never aborts the remainder (§4.4).
    #[instrument(level = "debug", skip(self), fields(subsystem = %self.name))]
    pub async fn dispose(self: &Arc<Self>) {
        {
            // Awaits completion of any in-flight build before tearing down.
            let _guard = self.build_state.lock().await;
        }
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let children: Vec<Arc<Subsystem>> = self.children.write().unwrap().drain(..).rev().collect();
        for child in children {
            Box::pin(child.dispose()).await;
        }

        self.manager.lock().await.dispose_all().await;
        *self.core_processor.write().unwrap() = None;

        let callbacks = self.on_dispose.lock().await.clone();
        for callback in callbacks {
            let ctx = SubsystemCtx::new();
            callback(self, &ctx);
        }

        self.is_built.store(false, Ordering::Release);
        let mut state = self.build_state.lock().await;
        state.result = None;
        debug!("subsystem disposed");
    }

    /// Insert `child` into this Subsystem's children and point its parent
    /// back-reference at `self`. Notifies a hierarchy facet if one is
    /// attached, falling back to the built-in map mutation alone otherwise
    /// (§9, "Hierarchy facet delegation with fallback").
    pub async fn add_child(self: &Arc<Self>, child: Arc<Subsystem>) -> Result<(), SubflowError> {
        if self.children.read().unwrap().iter().any(|c| c.name == child.name) {
            return Err(SubflowError::validation(format!(
                "child name '{}' already exists",
                child.name
            )));
        }
        child.set_parent(Some(self));
        self.children.write().unwrap().push(Arc::clone(&child));

        if let Some(facet) = self.find("hierarchy").await {
            if let Some(hierarchy) = facet.as_hierarchy() {
                hierarchy.child_added(&self.name, &child.name);
            }
        }
        Ok(())
    }

    pub async fn remove_child(self: &Arc<Self>, name: &str) -> Option<Arc<Subsystem>> {
        let removed = {
            let mut children = self.children.write().unwrap();
            let pos = children.iter().position(|c| c.name == name)?;
            Some(children.remove(pos))
        };
        if let Some(child) = &removed {
            child.set_parent(None);
            if let Some(facet) = self.find("hierarchy").await {
                if let Some(hierarchy) = facet.as_hierarchy() {
                    hierarchy.child_removed(&self.name, name);
                }
            }
        }
        removed
    }

    /// Sets (or clears) only this Subsystem's own parent back-reference.
    /// Deliberately asymmetric: detaching (`parent = None`) never touches
    /// the former parent's children list (§9, Open Question (a)).
    pub fn set_parent(&self, parent: Option<&Arc<Subsystem>>) {
        *self.parent.write().unwrap() = parent.map(Arc::downgrade);
    }

    pub fn get_parent(&self) -> Option<Arc<Subsystem>> {
        self.parent.read().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_root(&self) -> bool {
        self.get_parent().is_none()
    }

    pub fn get_root(self: &Arc<Self>) -> Arc<Subsystem> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.get_parent() {
            current = parent;
        }
        current
    }

    /// `"<root>://"` for a root, `"<root>://seg1/seg2"` for descendants
    /// (§4.4, §6 "Name-string format (bit-exact)").
    pub fn get_name_string(self: &Arc<Self>) -> String {
        let mut segments = Vec::new();
        let mut current = Arc::clone(self);
        loop {
            match current.get_parent() {
                Some(parent) => {
                    segments.push(current.name.clone());
                    current = parent;
                }
                None => {
                    segments.push(current.name.clone());
                    break;
                }
            }
        }
        segments.reverse();
        let root = &segments[0];
        if segments.len() == 1 {
            format!("{root}://")
        } else {
            format!("{root}://{}", segments[1..].join("/"))
        }
    }

    pub async fn register_route(
        &self,
        pattern: &str,
        handler: crate::facet::RouteHandler,
        overwrite: bool,
    ) -> Result<(), SubflowError> {
        let facet = self
            .find("router")
            .await
            .ok_or_else(|| SubflowError::dependency("missing router facet"))?;
        let router = facet
            .as_router()
            .ok_or_else(|| SubflowError::dependency("missing router facet"))?;
        router.register_route(pattern, handler, overwrite)
    }

    pub async fn unregister_route(&self, pattern: &str) -> Result<bool, SubflowError> {
        let facet = self
            .find("router")
            .await
            .ok_or_else(|| SubflowError::dependency("missing router facet"))?;
        let router = facet
            .as_router()
            .ok_or_else(|| SubflowError::dependency("missing router facet"))?;
        Ok(router.unregister_route(pattern))
    }

    pub async fn accept(
        &self,
        message: Message,
        options: DispatchOptions,
    ) -> Result<Option<DispatchResult>, SubflowError> {
        let processor = self.core_processor.read().unwrap().clone();
        let processor = processor.ok_or_else(|| SubflowError::dependency("missing processor facet"))?;
        let processor = processor
            .as_processor()
            .ok_or_else(|| SubflowError::dependency("missing processor facet"))?;
        processor.accept(message, options).await
    }

    pub async fn process_tick(&self) -> Option<DispatchResult> {
        let processor = self.core_processor.read().unwrap().clone()?;
        let processor = processor.as_processor()?;
        processor.process_tick().await
    }

    pub async fn process_immediately(&self, message: Message, options: DispatchOptions) -> Option<DispatchResult> {
        let processor = self.core_processor.read().unwrap().clone()?;
        let processor = processor.as_processor()?;
        Some(processor.process_immediately(message, options).await)
    }

    /// `processMessage` with the bare `(msg, options)` call shape (§4.5).
    pub async fn process_message(&self, message: Message, options: DispatchOptions) -> Option<DispatchResult> {
        let processor = self.core_processor.read().unwrap().clone()?;
        let processor = processor.as_processor()?;
        Some(processor.process_message(message, options).await)
    }

    /// `processMessage` with the `{msg, options}` pair call shape: `pair`'s
    /// own options apply first, `options` overrides them (§4.5).
    pub async fn process_message_pair(&self, pair: MessagePair, options: DispatchOptions) -> Option<DispatchResult> {
        let processor = self.core_processor.read().unwrap().clone()?;
        let processor = processor.as_processor()?;
        Some(processor.process_message_pair(pair, options).await)
    }

    pub async fn pause(&self) {
        if let Some(facet) = self.find("scheduler").await {
            if let Some(scheduler) = facet.as_scheduler() {
                scheduler.pause();
                return;
            }
        }
        warn!("pause() called with no scheduler facet attached");
    }

    pub async fn resume(&self) {
        if let Some(facet) = self.find("scheduler").await {
            if let Some(scheduler) = facet.as_scheduler() {
                scheduler.resume();
                return;
            }
        }
        warn!("resume() called with no scheduler facet attached");
    }
}

impl std::fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subsystem")
            .field("name", &self.name)
            .field("is_built", &self.is_built())
            .finish()
    }
}
