/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The callback: the unit of work the planner places.
//!
//! A *timer callback* arrives with a non-zero period and starts its chain;
//! a *regular callback* arrives with period 0 and inherits the period of
//! its chain's timer callback during [`System`](super::System) construction.
//!
//! # Ownership model
//! Callbacks live in the arena `Vec` owned by `System`; chains, nodes and
//! executors refer to them by id (the arena index). `assigned_executor` is
//! the back-link half of the executor→callback relation and is rewritten
//! every time an executor's `assign` runs.

/// A unit of work with an execution cost and a recurrence period.
#[derive(Debug, Clone)]
pub struct Callback {
    /// Unique, stable id; doubles as the index into the callback arena.
    pub id: usize,

    /// Worst-case execution time. Always positive for well-formed input.
    pub wcet: u64,

    /// Recurrence period (relative deadline). Non-zero for timer callbacks
    /// from the start; derived from the chain's timer for regular callbacks.
    pub period: u64,

    /// Node this callback belongs to (assignment granularity group).
    pub node_id: usize,

    /// Chain this callback belongs to (causal ordering group).
    pub chain_id: usize,

    /// `true` iff the callback was supplied with a non-zero period.
    pub is_timer: bool,

    /// Scheduling priority. `None` until priority assignment runs; then a
    /// unique integer where a smaller number means higher precedence.
    pub priority: Option<u32>,

    /// Executor this callback was placed on. `None` until the assignment
    /// engine places its node.
    pub assigned_executor: Option<usize>,
}

impl Callback {
    /// Fractional load this callback puts on its executor: `wcet / period`.
    ///
    /// Returns `0.0` while the period is still underived to avoid division
    /// by zero; construction guarantees every callback ends up with a
    /// non-zero period before any utilization is consumed.
    pub fn utilization(&self) -> f64 {
        if self.period == 0 {
            0.0
        } else {
            self.wcet as f64 / self.period as f64
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
