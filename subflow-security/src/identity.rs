//! `Identity`: the bundle `createIdentity` returns, wrapping a
//! [`ReaderWriterSet`] owned by one [`Pkr`] plus the `sendProtected`
//! forwarding path to a [`MessageKernel`] (§3, §4.6).

use crate::error::SecurityError;
use crate::principal::{Pkr, PrincipalRegistry};
use crate::rws::ReaderWriterSet;
use async_trait::async_trait;
use std::sync::Arc;
use subflow_core::{DispatchOptions, DispatchResult, Message};

/// Whatever a `MessageSystem` is, from `subflow-security`'s point of view:
/// something that can forward a message on behalf of a PKR. Implemented by
/// `subflow::MessageSystem`; kept as a trait here so this crate never has
/// to depend on the top-level crate that assembles the dispatch tree.
#[async_trait]
pub trait MessageKernel: Send + Sync {
    async fn send_protected(
        &self,
        owner: Pkr,
        message: Message,
        options: DispatchOptions,
    ) -> Result<DispatchResult, SecurityError>;
}

/// The three rights a [`ReaderWriterSet`] tracks, as used by
/// `require_auth`'s type-string parameter (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Read,
    Write,
    Grant,
}

impl AuthType {
    fn parse(value: &str) -> Result<Self, SecurityError> {
        match value {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "grant" => Ok(Self::Grant),
            other => Err(SecurityError::UnknownAuthType(other.to_string())),
        }
    }
}

/// A capability bundle for one owner PKR: read/write/grant checks against
/// its own resource, grant-mediated mutation of who else holds those
/// rights, and the `sendProtected` path out to the kernel.
pub struct Identity {
    owner: Pkr,
    rws: Arc<ReaderWriterSet>,
    kernel: Arc<dyn MessageKernel>,
}

impl Identity {
    pub fn owner(&self) -> Pkr {
        self.owner
    }

    pub fn can_read(&self, pkr: Pkr) -> bool {
        self.rws.can_read(pkr)
    }

    pub fn can_write(&self, pkr: Pkr) -> bool {
        self.rws.can_write(pkr)
    }

    pub fn can_grant(&self, pkr: Pkr) -> bool {
        self.rws.can_grant(pkr)
    }

    /// Runs `handler` iff this identity's owner currently holds `read` on
    /// its own resource (always true per the RWS invariant, barring a bug
    /// that somehow stripped the owner — see the universal invariant in
    /// §8: this always equals `handler()`).
    pub fn require_read<F, T>(&self, handler: Option<F>) -> Result<T, SecurityError>
    where
        F: FnOnce() -> T,
    {
        self.require_auth("read", handler)
    }

    pub fn require_write<F, T>(&self, handler: Option<F>) -> Result<T, SecurityError>
    where
        F: FnOnce() -> T,
    {
        self.require_auth("write", handler)
    }

    pub fn require_grant<F, T>(&self, handler: Option<F>) -> Result<T, SecurityError>
    where
        F: FnOnce() -> T,
    {
        self.require_auth("grant", handler)
    }

    /// `type ∈ {"read", "write", "grant"}`. `handler` is `Option` rather
    /// than a bare closure so a caller building handlers dynamically (e.g.
    /// from a registered-route table) can surface the same
    /// `"handler must be a function"` message the source raises for a
    /// non-function argument (§4.6).
    pub fn require_auth<F, T>(&self, auth_type: &str, handler: Option<F>) -> Result<T, SecurityError>
    where
        F: FnOnce() -> T,
    {
        let auth_type = AuthType::parse(auth_type)?;
        let handler = handler.ok_or(SecurityError::MissingHandler)?;

        let allowed = match auth_type {
            AuthType::Read => self.rws.can_read(self.owner),
            AuthType::Write => self.rws.can_write(self.owner),
            AuthType::Grant => self.rws.can_grant(self.owner),
        };
        if !allowed {
            return Err(SecurityError::PermissionDenied(format!(
                "owner lacks '{auth_type:?}' on this resource"
            )));
        }
        Ok(handler())
    }

    /// Requires `actor` to hold `grant`; returns `false` with no side
    /// effect otherwise (§4.6, §8 scenario 4).
    pub fn grant_reader(&self, actor: Pkr, target: Pkr) -> bool {
        if !self.rws.can_grant(actor) {
            return false;
        }
        self.rws.add_reader(target, false);
        true
    }

    pub fn grant_writer(&self, actor: Pkr, target: Pkr) -> bool {
        if !self.rws.can_grant(actor) {
            return false;
        }
        self.rws.add_writer(target, false);
        true
    }

    pub fn revoke_reader(&self, actor: Pkr, target: Pkr) -> bool {
        if !self.rws.can_grant(actor) {
            return false;
        }
        self.rws.remove_reader(target);
        true
    }

    pub fn revoke_writer(&self, actor: Pkr, target: Pkr) -> bool {
        if !self.rws.can_grant(actor) {
            return false;
        }
        self.rws.remove_writer(target);
        true
    }

    /// Extends `target`'s existing reader/writer membership with `grant`
    /// rights of its own.
    pub fn promote(&self, actor: Pkr, target: Pkr) -> bool {
        if !self.rws.can_grant(actor) {
            return false;
        }
        self.rws.add_reader(target, true);
        true
    }

    /// Strips `target`'s `grant` right, leaving any read/write membership
    /// untouched.
    pub fn demote(&self, actor: Pkr, target: Pkr) -> bool {
        if !self.rws.can_grant(actor) {
            return false;
        }
        self.rws.remove_granter(target);
        true
    }

    pub async fn send_protected(
        &self,
        message: Message,
        options: DispatchOptions,
    ) -> Result<DispatchResult, SecurityError> {
        self.kernel.send_protected(self.owner, message, options).await
    }
}

/// Builds an [`Identity`] for `owner`, owned by an RWS freshly constructed
/// with `owner` as the sole member of every set (§4.6).
///
/// `registry` and `kernel` are `Option` rather than bare references/`Arc`s
/// to preserve the source's runtime validation (`"invalid principals
/// registry"`, `"must support sendProtected"`) as real `Err` paths instead
/// of compile-time guarantees a caller could never actually violate.
pub fn create_identity(
    registry: Option<&PrincipalRegistry>,
    owner: Pkr,
    kernel: Option<Arc<dyn MessageKernel>>,
) -> Result<Identity, SecurityError> {
    let registry = registry.ok_or_else(|| SecurityError::InvalidRegistry("no registry supplied".into()))?;
    if !registry.contains(owner) {
        return Err(SecurityError::InvalidOwner(format!("{owner} is not a known principal")));
    }
    let kernel = kernel.ok_or(SecurityError::MissingSendProtected)?;

    Ok(Identity {
        owner,
        rws: Arc::new(ReaderWriterSet::new(owner)),
        kernel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::PrincipalKind;
    use serde_json::json;

    struct NoopKernel;

    #[async_trait]
    impl MessageKernel for NoopKernel {
        async fn send_protected(
            &self,
            owner: Pkr,
            message: Message,
            _options: DispatchOptions,
        ) -> Result<DispatchResult, SecurityError> {
            Ok(DispatchResult::ok(json!({ "owner": owner.to_string(), "path": message.path })))
        }
    }

    #[test]
    fn missing_kernel_fails_with_stable_message() {
        let registry = PrincipalRegistry::new();
        let owner = registry.create_principal(PrincipalKind::TopLevel);
        let err = create_identity(Some(&registry), owner, None).unwrap_err();
        assert_eq!(err.to_string(), "must support sendProtected");
    }

    #[test]
    fn unknown_owner_fails_with_stable_prefix() {
        let registry = PrincipalRegistry::new();
        let other = PrincipalRegistry::new();
        let foreign = other.create_principal(PrincipalKind::TopLevel);
        let err = create_identity(Some(&registry), foreign, Some(Arc::new(NoopKernel))).unwrap_err();
        assert!(err.to_string().contains("invalid owner PKR"));
    }

    #[test]
    fn owner_self_reference_always_passes_require_auth() {
        let registry = PrincipalRegistry::new();
        let owner = registry.create_principal(PrincipalKind::TopLevel);
        let identity = create_identity(Some(&registry), owner, Some(Arc::new(NoopKernel))).unwrap();

        for auth_type in ["read", "write", "grant"] {
            let result = identity.require_auth(auth_type, Some(|| 42)).unwrap();
            assert_eq!(result, 42);
        }
    }

    #[test]
    fn unknown_auth_type_is_rejected() {
        let registry = PrincipalRegistry::new();
        let owner = registry.create_principal(PrincipalKind::TopLevel);
        let identity = create_identity(Some(&registry), owner, Some(Arc::new(NoopKernel))).unwrap();
        let err = identity.require_auth("delete", Some(|| ())).unwrap_err();
        assert!(err.to_string().contains("unknown auth type"));
    }

    #[test]
    fn missing_handler_is_rejected() {
        let registry = PrincipalRegistry::new();
        let owner = registry.create_principal(PrincipalKind::TopLevel);
        let identity = create_identity(Some(&registry), owner, Some(Arc::new(NoopKernel))).unwrap();
        let err = identity.require_auth::<fn(), ()>("read", None).unwrap_err();
        assert_eq!(err.to_string(), "handler must be a function");
    }

    // ── §8 scenario 4: permission gate ──────────────────────────────────
    #[test]
    fn grant_without_grant_right_is_refused() {
        let registry = PrincipalRegistry::new();
        let a = registry.create_principal(PrincipalKind::TopLevel);
        let b = registry.create_principal(PrincipalKind::TopLevel);
        let other = registry.create_principal(PrincipalKind::Resource);
        let identity_a = create_identity(Some(&registry), a, Some(Arc::new(NoopKernel))).unwrap();

        assert!(identity_a.can_read(a));
        assert!(!identity_a.grant_reader(b, other));
    }

    #[tokio::test]
    async fn send_protected_forwards_to_kernel() {
        let registry = PrincipalRegistry::new();
        let owner = registry.create_principal(PrincipalKind::TopLevel);
        let identity = create_identity(Some(&registry), owner, Some(Arc::new(NoopKernel))).unwrap();

        let result = identity
            .send_protected(subflow_core::Message::new("a/b", json!(null)), DispatchOptions::new())
            .await
            .unwrap();
        assert_eq!(result.data.unwrap()["path"], "a/b");
    }
}
