//! `Friend`: the connection-gated facade over a `Friend`-kind [`Principal`]
//! (§4.6). Separate from [`Identity`](crate::identity::Identity) — a Friend
//! is a *remote peer*, not a resource owner; its `sendProtected` checks
//! liveness before forwarding rather than gating on read/write/grant.

use crate::error::SecurityError;
use crate::identity::MessageKernel;
use crate::principal::{Pkr, PrincipalRegistry};
use std::sync::Arc;
use subflow_core::{DispatchOptions, DispatchResult, Message};

/// A handle onto one `Friend`-kind principal plus the registry and kernel
/// needed to act on it.
pub struct Friend {
    registry: Arc<PrincipalRegistry>,
    pkr: Pkr,
    kernel: Arc<dyn MessageKernel>,
}

impl Friend {
    pub fn new(registry: Arc<PrincipalRegistry>, pkr: Pkr, kernel: Arc<dyn MessageKernel>) -> Self {
        Self { registry, pkr, kernel }
    }

    pub fn pkr(&self) -> Pkr {
        self.pkr
    }

    pub fn connect(&self) -> Result<(), SecurityError> {
        let principal = self.resolve()?;
        let friend = principal
            .friend()
            .ok_or_else(|| SecurityError::InvalidOwner(format!("{} is not a Friend principal", self.pkr)))?;
        friend.connect();
        Ok(())
    }

    pub fn disconnect(&self) -> Result<(), SecurityError> {
        let principal = self.resolve()?;
        let friend = principal
            .friend()
            .ok_or_else(|| SecurityError::InvalidOwner(format!("{} is not a Friend principal", self.pkr)))?;
        friend.disconnect();
        Ok(())
    }

    pub fn is_connected(&self) -> Result<bool, SecurityError> {
        let principal = self.resolve()?;
        let friend = principal
            .friend()
            .ok_or_else(|| SecurityError::InvalidOwner(format!("{} is not a Friend principal", self.pkr)))?;
        Ok(friend.is_connected())
    }

    /// Forwards to the kernel iff currently connected; a disconnected
    /// friend can't have messages routed on its behalf (§4.6).
    pub async fn send_protected(
        &self,
        message: Message,
        options: DispatchOptions,
    ) -> Result<DispatchResult, SecurityError> {
        if !self.is_connected()? {
            return Err(SecurityError::PermissionDenied(format!("{} is not connected", self.pkr)));
        }
        self.kernel.send_protected(self.pkr, message, options).await
    }

    fn resolve(&self) -> Result<dashmap::mapref::one::Ref<'_, uuid::Uuid, crate::principal::Principal>, SecurityError> {
        self.registry.resolve_pkr(self.pkr).map_err(SecurityError::InvalidOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::{FriendState, PrincipalKind};
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopKernel;

    #[async_trait]
    impl MessageKernel for NoopKernel {
        async fn send_protected(
            &self,
            _owner: Pkr,
            _message: Message,
            _options: DispatchOptions,
        ) -> Result<DispatchResult, SecurityError> {
            Ok(DispatchResult::ok(json!({})))
        }
    }

    #[tokio::test]
    async fn disconnected_friend_refuses_send_protected() {
        let registry = Arc::new(PrincipalRegistry::new());
        let pkr = registry.create_friend(PrincipalKind::Friend, Some(FriendState::new("wss://peer", None)));
        let friend = Friend::new(registry, pkr, Arc::new(NoopKernel));
        assert!(!friend.is_connected().unwrap());

        let err = friend.send_protected(Message::new("a", json!(null)), DispatchOptions::new()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn connected_friend_forwards_to_kernel() {
        let registry = Arc::new(PrincipalRegistry::new());
        let pkr = registry.create_friend(PrincipalKind::Friend, Some(FriendState::new("wss://peer", None)));
        let friend = Friend::new(registry, pkr, Arc::new(NoopKernel));
        friend.connect().unwrap();
        let result = friend
            .send_protected(Message::new("a", json!(null)), DispatchOptions::new())
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn non_friend_principal_rejects_connection_state_queries() {
        let registry = Arc::new(PrincipalRegistry::new());
        let pkr = registry.create_principal(PrincipalKind::TopLevel);
        let friend = Friend::new(registry, pkr, Arc::new(NoopKernel));
        assert!(friend.is_connected().is_err());
    }
}
