//! Built-in facet implementations for the six default contracts plus the
//! two optional ones (`queries`, and `synchronous` as a processor drop-in
//! that the `processor` implementation itself already satisfies — see
//! `Subsystem::select_core_processor`).

pub mod hierarchy;
pub mod listeners;
pub mod processor;
pub mod queries;
pub mod queue;
pub mod router;
pub mod scheduler;
