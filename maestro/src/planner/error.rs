/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the allocation planner.
//!
//! Two enums model the two failure layers:
//!
//! * [`ConsistencyFault`] — a state the planner guarantees can never be
//!   reached on well-formed input (a priority missing mid-search, a chain
//!   whose internal ordering breaks while a multi-chain check is running).
//!   These are programming-invariant violations, kept distinct from the
//!   ordinary `false` a strategy check returns, so the search's control
//!   flow stays boolean and the invariants stay independently testable.
//! * [`PlanError`] — top-level failure returned by the engine.
//!
//! An ordinary "strategy not satisfied" outcome is **not** an error; it is
//! the `Ok(false)` leg of the checker result and the search consumes it.

use thiserror::Error;

// ── Internal-consistency faults ───────────────────────────────────────────────

/// A planner invariant was observed broken mid-search.
///
/// Carried inside [`PlanError::Consistency`]. Every variant names the
/// entity so the failure can be traced without re-running the search.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyFault {
    /// A strategy check touched a callback whose priority was never
    /// assigned.
    #[error("callback {callback} has no priority during a strategy check")]
    MissingPriority { callback: usize },

    /// A strategy check touched a chain whose priority was never derived.
    #[error("chain {chain} has no priority during a strategy check")]
    MissingChainPriority { chain: usize },

    /// While checking a multi-chain placement, one chain's own callbacks
    /// were found out of causal priority order.
    #[error("chain {chain} breaks causal priority order inside a multi-chain check")]
    ChainOrderViolated { chain: usize },

    /// While checking a multi-chain placement, one chain's timer callback
    /// was found not to precede the chain's regular callbacks.
    #[error("chain {chain}'s timer does not precede its regular callbacks inside a multi-chain check")]
    TimerOrderViolated { chain: usize },
}

// ── Top-level planner errors ──────────────────────────────────────────────────

/// Top-level error type returned by the assignment engine.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The executor pool is empty; nothing can ever be placed.
    #[error("no executors available — the executor pool is empty")]
    NoExecutors,

    /// The core pool is empty; executors have nowhere to run.
    #[error("no cores available — the core pool is empty")]
    NoCores,

    /// A [`ConsistencyFault`] surfaced during the search.
    #[error("internal consistency fault: {0}")]
    Consistency(#[from] ConsistencyFault),
}
