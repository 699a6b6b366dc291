//! # Transched
//!
//! Cooperative transaction-execution scheduler over a static action tree.
//!
//! This crate contains:
//! - Outcome / Lifecycle / BranchId / EventType vocabulary
//! - SyncActivity / AsyncActivity leaf contracts and the Action tree
//! - TransactionScheduler: event-driven dispatch with fork/join semantics
//!
//! This crate does NOT care about:
//! - Where events come from (transport, timers, message buses)
//! - How transactions are persisted or retried
//! - Thread scheduling; calls are cooperative and caller-serialized

pub mod action;
pub mod context;
pub mod event;
pub mod scheduler;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::{
        Action, ActionTree, ActivityOutcome, AsyncActivity, SyncActivity, TreeError,
    };
    pub use crate::context::{TransactionContext, WorkingSet};
    pub use crate::event::Event;
    pub use crate::scheduler::TransactionScheduler;
    pub use crate::types::{BranchId, EventType, Lifecycle, Outcome, TransactionId};
}

// Re-export key types at crate root
pub use action::{Action, ActionTree, ActivityOutcome, AsyncActivity, SyncActivity};
pub use context::{TransactionContext, WorkingSet};
pub use event::Event;
pub use scheduler::TransactionScheduler;
pub use types::{BranchId, EventType, Lifecycle, Outcome, TransactionId};
