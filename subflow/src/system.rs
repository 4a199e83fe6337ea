//! `MessageSystem`: the root Subsystem of a dispatch tree, plus the
//! capability-checked `sendProtected` surface and the best-effort
//! `sendError` channel (§6).

use crate::error_ctx::ErrorCtx;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use subflow_core::{DispatchOptions, DispatchResult, Message, Subsystem, SubflowError, SubsystemCtx};
use subflow_security::{Identity, MessageKernel, Pkr, PrincipalRegistry, ReaderWriterSet, SecurityError};
use tracing::warn;

/// `Fn(&SubflowError, &ErrorCtx) + Send + Sync`, installed once via
/// [`MessageSystem::set_error_handler`] and otherwise defaulting to a
/// `tracing::warn!` line (§6).
pub type ErrorHandler = Arc<dyn Fn(&SubflowError, &ErrorCtx) + Send + Sync>;

fn default_error_handler() -> ErrorHandler {
    Arc::new(|err, ctx| {
        warn!(subsystem = %ctx.subsystem, path = ?ctx.path, correlation_id = ?ctx.correlation_id, "{err}");
    })
}

/// The root Subsystem of a dispatch tree, carrying the shared
/// `PrincipalRegistry` and the per-resource `ReaderWriterSet`s that gate
/// `sendProtected`.
///
/// A `MessageSystem` is not itself a distinct Subsystem subtype — it wraps
/// one (`root`) and adds the two pieces of state no individual Subsystem
/// needs on its own: principal bookkeeping and the replaceable error
/// channel.
pub struct MessageSystem {
    root: Arc<Subsystem>,
    principals: Arc<PrincipalRegistry>,
    /// RWS registered per resource path via [`MessageSystem::protect_resource`].
    /// A path with no registered RWS is treated as unprotected: any PKR may
    /// `sendProtected` to it.
    resources: DashMap<String, Arc<ReaderWriterSet>>,
    error_handler: RwLock<ErrorHandler>,
}

impl MessageSystem {
    /// Builds a fresh root Subsystem wired with `subflow_core::default_hooks`
    /// and an empty `PrincipalRegistry`.
    pub fn new(name: impl Into<String>) -> Result<Arc<Self>, SubflowError> {
        let root = Subsystem::new(name, SubsystemCtx::new(), subflow_core::default_hooks())?;
        let system = Arc::new(Self {
            root,
            principals: Arc::new(PrincipalRegistry::new()),
            resources: DashMap::new(),
            error_handler: RwLock::new(default_error_handler()),
        });

        let weak = Arc::downgrade(&system);
        let root_name = system.root.name().to_string();
        system.root.set_error_sink(Arc::new(move |message: &str| {
            if let Some(system) = weak.upgrade() {
                let ctx = ErrorCtx::new(root_name.clone());
                system.send_error(&SubflowError::handler(message), &ctx);
            }
        }));

        Ok(system)
    }

    pub fn root(&self) -> &Arc<Subsystem> {
        &self.root
    }

    pub fn principals(&self) -> &Arc<PrincipalRegistry> {
        &self.principals
    }

    /// Builds the root Subsystem (and transitively every already-registered
    /// child) if it isn't built yet.
    pub async fn build(&self) -> Result<(), SubflowError> {
        self.root.build().await
    }

    /// Adds `subsystem` as a child of the root and builds the tree if the
    /// root isn't already built (§6).
    pub async fn register_subsystem(&self, subsystem: Arc<Subsystem>) -> Result<(), SubflowError> {
        self.root.add_child(subsystem).await?;
        if !self.root.is_built() {
            self.root.build().await?;
        }
        Ok(())
    }

    /// Registers an RWS for `path`, gating future `sendProtected` calls
    /// against it. Returns the RWS so the caller can extend it with
    /// `add_reader`/`add_writer` right away.
    pub fn protect_resource(&self, path: impl Into<String>, owner: Pkr) -> Arc<ReaderWriterSet> {
        let rws = Arc::new(ReaderWriterSet::new(owner));
        self.resources.insert(path.into(), rws.clone());
        rws
    }

    pub fn resource_rws(&self, path: &str) -> Option<Arc<ReaderWriterSet>> {
        self.resources.get(path).map(|entry| entry.value().clone())
    }

    /// Builds an [`Identity`] for `owner` wired to this MessageSystem as its
    /// `MessageKernel`.
    pub fn identity(self: &Arc<Self>, owner: Pkr) -> Result<Identity, SecurityError> {
        let kernel: Arc<dyn MessageKernel> = self.clone();
        subflow_security::create_identity(Some(&self.principals), owner, Some(kernel))
    }

    /// Best-effort error channel (§6). Never suspends, never propagates —
    /// failures inside the handler itself are the host's problem, not
    /// this crate's.
    pub fn send_error(&self, err: &SubflowError, ctx: &ErrorCtx) {
        (self.error_handler.read().unwrap())(err, ctx);
    }

    /// Replaces the default `tracing::warn!` error channel.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.write().unwrap() = handler;
    }

    /// Validates `owner` has `write` on the resource named by
    /// `message.path` (unprotected paths default-allow), then forwards to
    /// the root Subsystem's `accept` (§6).
    async fn dispatch_protected(
        &self,
        owner: Pkr,
        message: Message,
        options: DispatchOptions,
    ) -> Result<DispatchResult, SecurityError> {
        if let Some(rws) = self.resource_rws(&message.path) {
            if !rws.can_write(owner) {
                return Err(SecurityError::PermissionDenied(format!(
                    "{owner} lacks write access to '{}'",
                    message.path
                )));
            }
        }

        let path = message.path.clone();
        let correlation_id = message.correlation_id.clone();
        match self.root.accept(message, options).await {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Ok(DispatchResult::ok(serde_json::Value::Null).with_correlation_id(correlation_id)),
            Err(err) => {
                self.send_error(&err, &ErrorCtx::new(self.root.name().to_string()).with_path(path));
                Err(SecurityError::PermissionDenied(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl MessageKernel for MessageSystem {
    async fn send_protected(
        &self,
        owner: Pkr,
        message: Message,
        options: DispatchOptions,
    ) -> Result<DispatchResult, SecurityError> {
        self.dispatch_protected(owner, message, options).await
    }
}
