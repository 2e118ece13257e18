/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Ordering strategies: the pure predicates behind every placement.
//!
//! Six checks guard the relative orderings that keep independent chains
//! priority-correct when they share executors and cores. The first four
//! judge a set of callbacks on one executor, the last two judge the
//! executors on one core:
//!
//! | | Scope | Requires |
//! |---|---|---|
//! | I | one chain, regular callbacks | priority numbers follow causal order |
//! | II | one chain, timer present | I over the regulars, timer strictly first |
//! | III | several chains, no timers | per-chain priority bands are disjoint, in chain order |
//! | IV | several chains, timers present | II per chain, timers ordered like their chains |
//! | V | one chain across a core | host executor ids follow causal order |
//! | VI | several chains across a core | per-chain executor bands are disjoint, in chain order |
//!
//! All checks are side-effect-free, so the engine can evaluate candidate
//! placements speculatively and discard them without rollback. The result
//! is `Ok(true)` / `Ok(false)` for the ordinary satisfied / not-satisfied
//! outcomes; `Err` is reserved for [`ConsistencyFault`]s — states the
//! priority-assignment phase makes unreachable, surfaced separately so
//! they are never mistaken for a failed placement attempt. In particular,
//! when a multi-chain check re-validates one chain's internal order and
//! that sub-check fails, the failure is a fault, not a `false`.

use std::collections::BTreeMap;

use super::error::ConsistencyFault;
use crate::model::System;

// ── Candidate descriptions ────────────────────────────────────────────────────

/// A proposed executor placement evaluated by the core-level checks.
///
/// Describes one executor that would run on the core under test, together
/// with any nodes whose callbacks would additionally land on it. The
/// executor may already be hosted on the core (reuse placement) or not yet
/// attached (spawn placement); both cases merge the same way.
#[derive(Debug, Clone)]
pub struct CorePlacement {
    pub executor_id: usize,
    /// Nodes whose callbacks are tentatively added to `executor_id`.
    pub node_ids: Vec<usize>,
}

impl CorePlacement {
    /// An executor brought to the core as-is.
    pub fn executor(executor_id: usize) -> Self {
        Self {
            executor_id,
            node_ids: Vec::new(),
        }
    }

    /// An executor with extra nodes tentatively loaded onto it.
    pub fn with_nodes(executor_id: usize, node_ids: Vec<usize>) -> Self {
        Self {
            executor_id,
            node_ids,
        }
    }
}

// ── Executor-level checks ─────────────────────────────────────────────────────

/// Would `executor_id` still be priority-correct with the candidate nodes'
/// callbacks added?
///
/// Merges the executor's current callbacks with the candidates
/// (deduplicated, causal order), then dispatches on how many chains the
/// union spans and whether it contains a timer callback.
pub fn satisfies_executor_strategies(
    system: &System,
    executor_id: usize,
    candidate_nodes: &[usize],
) -> Result<bool, ConsistencyFault> {
    let mut merged: Vec<usize> = system.executors[executor_id].callbacks.clone();
    for &node in candidate_nodes {
        merged.extend(system.nodes[node].callbacks.iter().copied());
    }
    merged.sort_unstable();
    merged.dedup();

    if merged.is_empty() {
        return Ok(true);
    }

    let chains = chains_present(system, &merged);
    let has_timer = merged.iter().any(|&cb| system.callbacks[cb].is_timer);

    if chains.len() == 1 {
        if has_timer {
            single_chain_with_timer(system, &merged)
        } else {
            single_chain_order(system, &merged)
        }
    } else if has_timer {
        chain_bands_with_timers(system, &merged)
    } else {
        chain_bands_disjoint(system, &merged)
    }
}

/// One chain, regular callbacks only: walking the union in causal
/// (callback-id) order, priority numbers must never fall back.
fn single_chain_order(system: &System, callbacks: &[usize]) -> Result<bool, ConsistencyFault> {
    for pair in callbacks.windows(2) {
        if priority_of(system, pair[0])? > priority_of(system, pair[1])? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// One chain including its timer: the regular callbacks must satisfy the
/// causal order on their own, and the timer's number must sit strictly
/// below every regular's.
fn single_chain_with_timer(
    system: &System,
    callbacks: &[usize],
) -> Result<bool, ConsistencyFault> {
    let (timers, regulars): (Vec<usize>, Vec<usize>) = callbacks
        .iter()
        .partition(|&&cb| system.callbacks[cb].is_timer);

    if !single_chain_order(system, &regulars)? {
        return Ok(false);
    }
    let Some(&timer) = timers.first() else {
        return Ok(true);
    };
    let timer_priority = priority_of(system, timer)?;
    for &regular in &regulars {
        if timer_priority >= priority_of(system, regular)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Several chains, no timers: each chain keeps its own causal order
/// (anything else is a fault — the global numbering makes it impossible)
/// and the chains' priority-number bands must not interleave: every
/// number of the higher-precedence chain sits strictly below every number
/// of the lower-precedence one.
fn chain_bands_disjoint(system: &System, callbacks: &[usize]) -> Result<bool, ConsistencyFault> {
    let groups = group_by_chain(system, callbacks);

    for (&chain, members) in &groups {
        if !single_chain_order(system, members)? {
            return Err(ConsistencyFault::ChainOrderViolated { chain });
        }
    }

    let bands = priority_bands(system, &groups)?;
    for (i, &(chain_a, min_a, max_a)) in bands.iter().enumerate() {
        for &(chain_b, min_b, max_b) in &bands[i + 1..] {
            let (high, low) = order_by_chain_priority(
                system,
                (chain_a, min_a, max_a),
                (chain_b, min_b, max_b),
            )?;
            // high = (chain, min, max) of the higher-precedence chain
            if high.2 >= low.1 {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Several chains with timers: each chain must be internally valid
/// (timer strictly first where present — anything else is a fault), and
/// for every pair whose timers are both in the union, the timers must be
/// numbered in the same order as their chains.
fn chain_bands_with_timers(
    system: &System,
    callbacks: &[usize],
) -> Result<bool, ConsistencyFault> {
    let groups = group_by_chain(system, callbacks);

    let mut timers: BTreeMap<usize, usize> = BTreeMap::new();
    for (&chain, members) in &groups {
        let timer = members
            .iter()
            .find(|&&cb| system.callbacks[cb].is_timer)
            .copied();
        let valid = match timer {
            Some(_) => single_chain_with_timer(system, members)?,
            None => single_chain_order(system, members)?,
        };
        if !valid {
            return Err(match timer {
                Some(_) => ConsistencyFault::TimerOrderViolated { chain },
                None => ConsistencyFault::ChainOrderViolated { chain },
            });
        }
        if let Some(timer) = timer {
            timers.insert(chain, timer);
        }
    }

    let with_timers: Vec<(usize, usize)> = timers.into_iter().collect();
    for (i, &(chain_a, timer_a)) in with_timers.iter().enumerate() {
        for &(chain_b, timer_b) in &with_timers[i + 1..] {
            let a_first = chain_priority_of(system, chain_a)? < chain_priority_of(system, chain_b)?;
            let (high_timer, low_timer) = if a_first {
                (timer_a, timer_b)
            } else {
                (timer_b, timer_a)
            };
            if priority_of(system, high_timer)? >= priority_of(system, low_timer)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

// ── Core-level checks ─────────────────────────────────────────────────────────

/// Would `core_id` still be priority-correct with the candidate executors
/// (and their tentatively loaded nodes) running on it?
///
/// Merges the callbacks of the core's current executors with the
/// candidates', keeping track of which executor would host each callback,
/// then dispatches on how many chains the union spans.
pub fn satisfies_core_strategies(
    system: &System,
    core_id: usize,
    candidates: &[CorePlacement],
) -> Result<bool, ConsistencyFault> {
    // callback id → hosting executor id; BTreeMap iteration doubles as the
    // causal (callback-id ascending) walk
    let mut hosts: BTreeMap<usize, usize> = BTreeMap::new();
    for &exe in &system.cores[core_id].executors {
        for &cb in &system.executors[exe].callbacks {
            hosts.insert(cb, exe);
        }
    }
    for candidate in candidates {
        for &cb in &system.executors[candidate.executor_id].callbacks {
            hosts.insert(cb, candidate.executor_id);
        }
        for &node in &candidate.node_ids {
            for &cb in &system.nodes[node].callbacks {
                hosts.insert(cb, candidate.executor_id);
            }
        }
    }

    if hosts.is_empty() {
        return Ok(true);
    }

    let callbacks: Vec<usize> = hosts.keys().copied().collect();
    if chains_present(system, &callbacks).len() == 1 {
        Ok(host_order_follows_chain(&hosts))
    } else {
        executor_bands_disjoint(system, &hosts)
    }
}

/// One chain across the core: walking the union in causal order, the
/// hosting executors' fixed priorities (their ids) must never fall back —
/// a lower-id executor must not run later-chain work than a higher-id
/// executor runs earlier-chain work.
fn host_order_follows_chain(hosts: &BTreeMap<usize, usize>) -> bool {
    let hosted: Vec<usize> = hosts.values().copied().collect();
    hosted.windows(2).all(|pair| pair[0] <= pair[1])
}

/// Several chains across the core: for every chain pair, the executors
/// hosting the higher-precedence chain must all have ids at or below the
/// executors hosting the lower-precedence chain.
fn executor_bands_disjoint(
    system: &System,
    hosts: &BTreeMap<usize, usize>,
) -> Result<bool, ConsistencyFault> {
    // chain id → (min, max) hosting executor id
    let mut spans: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for (&cb, &exe) in hosts {
        let chain = system.callbacks[cb].chain_id;
        let span = spans.entry(chain).or_insert((exe, exe));
        span.0 = span.0.min(exe);
        span.1 = span.1.max(exe);
    }

    let spans: Vec<(usize, (usize, usize))> = spans.into_iter().collect();
    for (i, &(chain_a, span_a)) in spans.iter().enumerate() {
        for &(chain_b, span_b) in &spans[i + 1..] {
            let a_first = chain_priority_of(system, chain_a)? < chain_priority_of(system, chain_b)?;
            let (high, low) = if a_first {
                (span_a, span_b)
            } else {
                (span_b, span_a)
            };
            if high.1 > low.0 {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn priority_of(system: &System, callback: usize) -> Result<u32, ConsistencyFault> {
    system.callbacks[callback]
        .priority
        .ok_or(ConsistencyFault::MissingPriority { callback })
}

fn chain_priority_of(system: &System, chain: usize) -> Result<u32, ConsistencyFault> {
    system.chains[chain]
        .priority
        .ok_or(ConsistencyFault::MissingChainPriority { chain })
}

/// Distinct chain ids represented in `callbacks`, ascending.
fn chains_present(system: &System, callbacks: &[usize]) -> Vec<usize> {
    let mut chains: Vec<usize> = callbacks
        .iter()
        .map(|&cb| system.callbacks[cb].chain_id)
        .collect();
    chains.sort_unstable();
    chains.dedup();
    chains
}

/// Split a causally-ordered callback union into per-chain subsets,
/// preserving the order inside each subset.
fn group_by_chain(system: &System, callbacks: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &cb in callbacks {
        groups.entry(system.callbacks[cb].chain_id).or_default().push(cb);
    }
    groups
}

/// Per-chain `(chain, min priority, max priority)` summaries.
fn priority_bands(
    system: &System,
    groups: &BTreeMap<usize, Vec<usize>>,
) -> Result<Vec<(usize, u32, u32)>, ConsistencyFault> {
    let mut bands = Vec::with_capacity(groups.len());
    for (&chain, members) in groups {
        let mut min = u32::MAX;
        let mut max = 0;
        for &cb in members {
            let p = priority_of(system, cb)?;
            min = min.min(p);
            max = max.max(p);
        }
        bands.push((chain, min, max));
    }
    Ok(bands)
}

/// Order two `(chain, min, max)` bands so the higher-precedence chain
/// (numerically smaller chain priority) comes first.
fn order_by_chain_priority(
    system: &System,
    a: (usize, u32, u32),
    b: (usize, u32, u32),
) -> Result<((usize, u32, u32), (usize, u32, u32)), ConsistencyFault> {
    if chain_priority_of(system, a.0)? < chain_priority_of(system, b.0)? {
        Ok((a, b))
    } else {
        Ok((b, a))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
