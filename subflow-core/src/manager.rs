//! `FacetManager`: the per-Subsystem insertion-ordered `kind -> Facet`
//! mapping with transactional add/dispose (§4.2).

use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx};
use std::sync::Arc;
use tracing::{debug, warn};

/// One entry added to a manager, tracked by kind for transaction rollback
/// and reverse-order dispose.
struct Entry {
    kind: &'static str,
    facet: Arc<dyn Facet>,
    attached: bool,
}

/// A pushed frame recording which kinds were added since `begin_transaction`.
#[derive(Default)]
struct Frame {
    kinds: Vec<&'static str>,
}

/// Per-Subsystem registry of live facets.
///
/// Invariants (§4.2): at most one facet per kind; insertion order matches
/// the planned dependency order; dispose reverses that order.
pub struct FacetManager {
    entries: Vec<Entry>,
    transactions: Vec<Frame>,
}

/// Options controlling a single `add`/`add_many` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    pub init: bool,
    pub attach: bool,
    pub overwrite: bool,
}

impl FacetManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    pub fn find(&self, kind: &str) -> Option<Arc<dyn Facet>> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.attached)
            .map(|e| Arc::clone(&e.facet))
    }

    /// All attached facets, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Facet>)> {
        self.entries.iter().filter(|e| e.attached).map(|e| (e.kind, &e.facet))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one facet under `kind`. If `opts.init` is set, `facet.init` is
    /// called before the entry is considered live; failure here means the
    /// facet is never inserted. `opts.attach` gates whether the facet is
    /// visible to `find` (a facet can be added but not exposed, matching
    /// `shouldAttach()` returning `false`).
    pub async fn add(
        &mut self,
        kind: &'static str,
        facet: Arc<dyn Facet>,
        ctx: &FacetInitCtx<'_>,
        opts: AddOptions,
    ) -> Result<(), SubflowError> {
        if self.contains(kind) && !opts.overwrite {
            return Err(SubflowError::build(format!(
                "facet for kind '{kind}' already exists"
            )));
        }

        if opts.init {
            facet.init(ctx).await.map_err(|e| {
                warn!(kind, error = %e, "facet init failed");
                e
            })?;
        }

        if opts.overwrite {
            self.entries.retain(|e| e.kind != kind);
        }

        let attached = opts.attach && facet.should_attach();
        self.entries.push(Entry { kind, facet, attached });

        if let Some(frame) = self.transactions.last_mut() {
            frame.kinds.push(kind);
        }

        debug!(kind, attached, "facet added");
        Ok(())
    }

    /// Add a batch of `(kind, facet)` pairs in the given order, all or
    /// nothing: any failure rolls back every facet added by this call
    /// (§4.2). Per-Subsystem concurrency is single-threaded (§6), so
    /// "parallelizable when required sets are disjoint" collapses to
    /// sequential execution here — the ordering guarantee this promises
    /// (a facet's init never observes an uninitialized required facet) is
    /// satisfied either way, since the caller is expected to pass kinds
    /// already in dependency order.
    pub async fn add_many(
        &mut self,
        entries: Vec<(&'static str, Arc<dyn Facet>)>,
        ctx: &FacetInitCtx<'_>,
        opts: AddOptions,
    ) -> Result<(), SubflowError> {
        self.begin_transaction();
        for (kind, facet) in entries {
            if let Err(err) = self.add(kind, facet, ctx, opts).await {
                self.rollback().await;
                return Err(err);
            }
        }
        self.commit();
        Ok(())
    }

    /// Remove and dispose the facet at `kind`, regardless of transaction
    /// state. Returns whether a facet was present.
    pub async fn remove(&mut self, kind: &str) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.kind == kind) else {
            return false;
        };
        let entry = self.entries.remove(pos);
        if let Err(err) = entry.facet.dispose().await {
            warn!(kind, error = %err, "facet dispose failed during remove");
        }
        true
    }

    pub fn begin_transaction(&mut self) {
        self.transactions.push(Frame::default());
    }

    /// Drop the current transaction frame without undoing anything.
    pub fn commit(&mut self) {
        self.transactions.pop();
    }

    /// Dispose every facet tracked by the current frame, in reverse
    /// insertion order, swallowing individual dispose errors, then unmap
    /// them. No-op (but logs) if no transaction is active.
    pub async fn rollback(&mut self) {
        let Some(frame) = self.transactions.pop() else {
            warn!("rollback called with no active transaction");
            return;
        };
        for kind in frame.kinds.iter().rev() {
            if let Some(pos) = self.entries.iter().position(|e| e.kind == *kind) {
                let entry = self.entries.remove(pos);
                if let Err(err) = entry.facet.dispose().await {
                    warn!(kind = *kind, error = %err, "facet dispose failed during rollback");
                }
            }
        }
    }

    /// Dispose every facet in reverse insertion order, swallowing
    /// individual errors so one failure never aborts the remainder (§4.4).
    pub async fn dispose_all(&mut self) {
        while let Some(entry) = self.entries.pop() {
            if let Err(err) = entry.facet.dispose().await {
                warn!(kind = entry.kind, error = %err, "facet dispose failed");
            }
        }
    }
}

impl Default for FacetManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::SubsystemCtx;
    use async_trait::async_trait;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Recording {
        kind: &'static str,
        initialized: AtomicBool,
        disposed: AtomicBool,
        dispose_order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        fail_init: bool,
    }

    #[async_trait]
    impl Facet for Recording {
        fn kind(&self) -> &'static str {
            self.kind
        }
        fn source(&self) -> &str {
            "test"
        }
        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }
        fn is_disposed(&self) -> bool {
            self.disposed.load(Ordering::SeqCst)
        }
        async fn init(&self, _: &FacetInitCtx<'_>) -> Result<(), SubflowError> {
            if self.fail_init {
                return Err(SubflowError::build("boom"));
            }
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn dispose(&self) -> Result<(), SubflowError> {
            self.disposed.store(true, Ordering::SeqCst);
            self.dispose_order.lock().unwrap().push(self.kind);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn facet(kind: &'static str, log: &Arc<std::sync::Mutex<Vec<&'static str>>>, fail: bool) -> Arc<dyn Facet> {
        Arc::new(Recording {
            kind,
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            dispose_order: Arc::clone(log),
            fail_init: fail,
        })
    }

    #[tokio::test]
    async fn duplicate_kind_without_overwrite_fails() {
        let mut manager = FacetManager::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let ctx = SubsystemCtx::new();
        let init_ctx = FacetInitCtx { ctx: &ctx, subsystem_name: "root" };
        manager
            .add("queue", facet("queue", &log, false), &init_ctx, AddOptions { init: true, attach: true, overwrite: false })
            .await
            .unwrap();
        let err = manager
            .add("queue", facet("queue", &log, false), &init_ctx, AddOptions { init: true, attach: true, overwrite: false })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn rollback_disposes_in_reverse_insertion_order() {
        let mut manager = FacetManager::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let ctx = SubsystemCtx::new();
        let init_ctx = FacetInitCtx { ctx: &ctx, subsystem_name: "root" };
        let opts = AddOptions { init: true, attach: true, overwrite: false };

        let result = manager
            .add_many(
                vec![
                    ("queue", facet("queue", &log, false)),
                    ("router", facet("router", &log, false)),
                    ("processor", facet("processor", &log, true)),
                ],
                &init_ctx,
                opts,
            )
            .await;

        assert!(result.is_err());
        assert!(!manager.contains("queue"));
        assert!(!manager.contains("router"));
        assert!(!manager.contains("processor"));
        assert_eq!(&*log.lock().unwrap(), &["router", "queue"]);
    }

    #[tokio::test]
    async fn dispose_throwing_facet_is_still_removed() {
        struct Always;
        #[async_trait]
        impl Facet for Always {
            fn kind(&self) -> &'static str {
                "broken"
            }
            fn source(&self) -> &str {
                "test"
            }
            fn is_initialized(&self) -> bool {
                true
            }
            fn is_disposed(&self) -> bool {
                false
            }
            async fn init(&self, _: &FacetInitCtx<'_>) -> Result<(), SubflowError> {
                Ok(())
            }
            async fn dispose(&self) -> Result<(), SubflowError> {
                Err(SubflowError::dispose("always fails"))
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let mut manager = FacetManager::new();
        let ctx = SubsystemCtx::new();
        let init_ctx = FacetInitCtx { ctx: &ctx, subsystem_name: "root" };
        manager
            .add("broken", Arc::new(Always), &init_ctx, AddOptions { init: true, attach: true, overwrite: false })
            .await
            .unwrap();
        assert!(manager.remove("broken").await);
        assert!(!manager.contains("broken"));
    }
}
