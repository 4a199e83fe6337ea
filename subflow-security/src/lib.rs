//! Capability-based principals, reader/writer/grant sets, and protected
//! message forwarding for the subflow runtime (§3, §4.6 of the runtime
//! spec).
//!
//! This crate has no notion of Subsystems or dispatch on its own — it
//! depends on `subflow-core` only for the [`subflow_core::Message`] /
//! [`subflow_core::DispatchOptions`] / [`subflow_core::DispatchResult`]
//! shapes that flow through [`identity::MessageKernel`]. The top-level
//! `subflow` crate wires a `MessageSystem` in as that kernel.

pub mod error;
pub mod friend;
pub mod identity;
pub mod principal;
pub mod rws;

pub use error::SecurityError;
pub use friend::Friend;
pub use identity::{create_identity, AuthType, Identity, MessageKernel};
pub use principal::{FriendState, Pkr, Principal, PrincipalKind, PrincipalRegistry};
pub use rws::ReaderWriterSet;
