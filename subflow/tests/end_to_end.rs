//! End-to-end coverage across `subflow-core` and `subflow-security` wired
//! through a `MessageSystem`.

use serde_json::json;
use std::sync::Arc;
use subflow::{DispatchOptions, Message, MessageSystem, PrincipalKind, Subsystem, SubsystemCtx};

async fn echoing_child(name: &str) -> Arc<Subsystem> {
    let child = Subsystem::new(name, SubsystemCtx::new(), subflow::default_hooks()).unwrap();
    child.build().await.unwrap();
    child
        .register_route(
            "test/path",
            Arc::new(|message, _params, _options| {
                Box::pin(async move { Ok(json!({ "processed": message.id })) })
            }),
            false,
        )
        .await
        .unwrap();
    child
}

#[tokio::test]
async fn registered_subsystem_builds_and_dispatches() {
    let system = MessageSystem::new("root").unwrap();
    let child = echoing_child("workers").await;
    system.register_subsystem(child.clone()).await.unwrap();

    assert!(child.is_built());
    assert_eq!(child.get_name_string(), "root://workers");

    let accepted = child
        .accept(Message::new("test/path", json!(null)), DispatchOptions::new())
        .await
        .unwrap();
    assert!(accepted.is_none(), "FIFO path queues rather than answering inline");

    let result = child.process_tick().await.unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn send_protected_enforces_write_access_on_registered_resources() {
    let system = MessageSystem::new("root").unwrap();
    let child = echoing_child("workers").await;
    system.register_subsystem(child).await.unwrap();

    let owner = system.principals().create_principal(PrincipalKind::TopLevel);
    let stranger = system.principals().create_principal(PrincipalKind::TopLevel);
    system.protect_resource("test/path", owner);

    let owner_identity = system.identity(owner).unwrap();
    let result = owner_identity
        .send_protected(Message::new("test/path", json!(null)), DispatchOptions::new())
        .await
        .unwrap();
    assert!(result.success);

    let stranger_identity = system.identity(stranger).unwrap();
    let err = stranger_identity
        .send_protected(Message::new("test/path", json!(null)), DispatchOptions::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("lacks write access"));
}

#[tokio::test]
async fn unprotected_paths_default_allow() {
    let system = MessageSystem::new("root").unwrap();
    let child = echoing_child("workers").await;
    system.register_subsystem(child).await.unwrap();

    let anyone = system.principals().create_principal(PrincipalKind::TopLevel);
    let identity = system.identity(anyone).unwrap();
    let result = identity
        .send_protected(Message::new("test/path", json!(null)), DispatchOptions::new())
        .await
        .unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn missing_route_reports_failure_through_send_error() {
    let system = MessageSystem::new("root").unwrap();
    let child = echoing_child("workers").await;
    system.register_subsystem(child.clone()).await.unwrap();

    let result = child
        .process_immediately(Message::new("nonexistent/path", json!(null)), DispatchOptions::new())
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("No route handler found"));
}
