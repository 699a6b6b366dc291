//! Core type definitions
//!
//! This module defines the scheduler vocabulary:
//! - Outcome: the closed result set returned by every scheduler operation
//! - Lifecycle: scheduler instance state
//! - BranchId / EventType / TransactionId: strongly-typed identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result vocabulary for scheduler operations.
///
/// Every call into the scheduler returns one of these values; there is no
/// separate error channel for domain results. `ProgrammerError` reports a
/// caller contract violation (wrong operation for the current lifecycle,
/// duplicate live branch id) and means the instance must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The transaction (or node) resolved successfully.
    Success,
    /// The transaction (or node) resolved with a failure.
    Failed,
    /// Suspended on one or more pending events; deliver more events.
    StillRunning,
    /// Terminated by an explicit `stop` call.
    ForceStopped,
    /// Externally-signalled timeout reason; never produced internally.
    TimedOut,
    /// The delivered event matched no pending leaf; state is unchanged.
    UnknownEvent,
    /// Externally-supplied termination reason (duplicate transaction id).
    DuplicateTransactionId,
    /// Operation invalid for the current lifecycle, or a contract breach.
    ProgrammerError,
}

impl Outcome {
    /// True for outcomes that resolve a node for good (`Success`/`Failed`).
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Failed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::StillRunning => "still_running",
            Outcome::ForceStopped => "force_stopped",
            Outcome::TimedOut => "timed_out",
            Outcome::UnknownEvent => "unknown_event",
            Outcome::DuplicateTransactionId => "duplicate_transaction_id",
            Outcome::ProgrammerError => "programmer_error",
        };
        f.write_str(label)
    }
}

/// Scheduler instance lifecycle.
///
/// Transitions are one-way: `NotStarted -> Running -> Terminated`.
/// `Terminated` is permanent for the instance regardless of how it was
/// reached (completion, `stop`, or `kill`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    NotStarted,
    Running,
    Terminated,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Lifecycle::NotStarted => "not_started",
            Lifecycle::Running => "running",
            Lifecycle::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

/// Caller-assigned identifier for a forked execution branch.
///
/// Id 0 is reserved for the main continuation; forking with id 0 collides
/// with the live main branch and reports `ProgrammerError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub u32);

impl BranchId {
    /// The main continuation branch.
    pub const MAIN: BranchId = BranchId(0);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn is_main(&self) -> bool {
        *self == Self::MAIN
    }
}

impl From<u32> for BranchId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Event type identifier used for routing.
///
/// The scheduler performs equality matching on this value only; payloads
/// are forwarded verbatim to the resolving leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(pub String);

impl EventType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Identifier for one transaction attempt, used for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a random transaction id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
