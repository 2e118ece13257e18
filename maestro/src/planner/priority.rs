/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Priority assignment over the chain structure.
//!
//! One dense counter walks chains in chain-id order and, inside each chain,
//! callbacks in causal (callback-id) order. The result is a total order:
//! every callback of a lower-id chain carries a smaller number than every
//! callback of a higher-id chain, and within a chain the numbers grow with
//! causal position. A smaller number means higher scheduling precedence.
//!
//! Two derivation passes follow the assignment itself: chain priorities
//! (each chain takes its timer callback's number) and node sort keys (each
//! node takes its numerically largest member number). These are free
//! functions so each pass stays independently testable.

use tracing::debug;

use crate::model::System;

/// Assign every callback a unique priority in `1..=callback_count`, then
/// derive chain priorities and node sort keys.
///
/// Total over well-formed input; `System` construction guarantees the
/// chain member lists are already in causal order.
pub fn assign_priorities(system: &mut System) {
    let System {
        callbacks, chains, ..
    } = system;

    let mut priority: u32 = 1;
    for chain in chains.iter() {
        for &cb in &chain.callbacks {
            callbacks[cb].priority = Some(priority);
            priority += 1;
        }
    }
    debug!(assigned = priority - 1, "callback priorities assigned");

    set_chain_priorities(system);
    set_node_highest_priorities(system);
}

/// Each chain's priority is its timer callback's priority.
fn set_chain_priorities(system: &mut System) {
    let System {
        callbacks, chains, ..
    } = system;
    for chain in chains.iter_mut() {
        chain.priority = callbacks[chain.timer()].priority;
    }
}

/// Each node's sort key is the numerically largest priority among its
/// members.
fn set_node_highest_priorities(system: &mut System) {
    let System {
        callbacks, nodes, ..
    } = system;
    for node in nodes.iter_mut() {
        node.highest_priority = node
            .callbacks
            .iter()
            .filter_map(|&cb| callbacks[cb].priority)
            .max();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
