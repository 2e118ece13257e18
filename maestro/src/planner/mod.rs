//! The allocation planner: priority assignment, ordering strategies and
//! the assignment engine.
//!
//! [`plan`] drives the whole pipeline over a built
//! [`System`](crate::model::System):
//!
//! 1. [`priority::assign_priorities`] — one dense numbering over all
//!    callbacks, derived chain priorities and node sort keys.
//! 2. [`AssignmentEngine::run`] — places every node on an executor and
//!    every used executor on a core.
//!
//! # The engine
//!
//! The engine consumes nodes most-urgent-first. Each round it greedily
//! selects a prefix of the pending nodes worth at most one core of load,
//! then takes one of two placement paths:
//!
//! * **spawn** — an empty executor exists: load the selection onto the
//!   lowest-id empty executor and look for a core that fits it and keeps
//!   the core-level orderings intact;
//! * **reuse** — every executor is busy: look for a hosted executor whose
//!   core can absorb the selection and which keeps both the core-level
//!   and executor-level orderings intact.
//!
//! When neither clean path exists the engine degrades deliberately rather
//! than failing: it shrinks the selection, and once the selection is a
//! single node it forces the node onto the least-utilized occupied core —
//! waiving the utilization bound — and collapses that core's executors
//! into one. A core with a single executor trivially satisfies the
//! core-level orderings, so the forced path always ends in a consistent
//! state and the pending set shrinks every round: the engine terminates
//! for any input with at least one executor and one core.
//!
//! All candidate evaluation goes through the side-effect-free checks in
//! [`strategy`]; the engine is the only mutator of executors and cores.

pub mod error;
pub mod priority;
pub mod strategy;

pub use error::{ConsistencyFault, PlanError};
pub use strategy::{satisfies_core_strategies, satisfies_executor_strategies, CorePlacement};

use tracing::{debug, info, warn};

use crate::model::System;

// ── Pipeline entry point ──────────────────────────────────────────────────────

/// Run priority assignment and the assignment engine over `system`.
pub fn plan(system: &mut System) -> Result<(), PlanError> {
    priority::assign_priorities(system);
    AssignmentEngine::new(system).run()
}

// ── AssignmentEngine ──────────────────────────────────────────────────────────

/// The search that maps nodes onto executors and executors onto cores.
///
/// Borrows the [`System`] for the duration of one run; all other state is
/// local to [`run`](Self::run), so a fresh engine on a fresh system always
/// reproduces the same plan.
pub struct AssignmentEngine<'a> {
    system: &'a mut System,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(system: &'a mut System) -> Self {
        Self { system }
    }

    // ── Outer loop ────────────────────────────────────────────────────────────

    /// Place every node. See the module docs for the search structure.
    ///
    /// # Errors
    /// * [`PlanError::NoExecutors`] / [`PlanError::NoCores`] — an empty
    ///   pool; nothing can ever be placed.
    /// * [`PlanError::Consistency`] — a broken planner invariant, never an
    ///   ordinary "no placement found" outcome.
    pub fn run(&mut self) -> Result<(), PlanError> {
        if self.system.executors.is_empty() {
            return Err(PlanError::NoExecutors);
        }
        if self.system.cores.is_empty() {
            return Err(PlanError::NoCores);
        }

        let mut pending: Vec<usize> = (0..self.system.nodes.len()).collect();
        // Most urgent first: numerically largest sort key leads, stable so
        // ties keep node-id order.
        pending.sort_by(|&a, &b| {
            self.system.nodes[b]
                .highest_priority
                .cmp(&self.system.nodes[a].highest_priority)
        });

        info!(
            nodes = pending.len(),
            executors = self.system.executors.len(),
            cores = self.system.cores.len(),
            "=== AssignmentEngine::run() ==="
        );

        while !pending.is_empty() {
            let selected = self.select_nodes(&pending);
            match self.system.lowest_empty_executor() {
                Some(executor) => self.place_via_spawn(&mut pending, selected, executor)?,
                None => self.place_via_reuse(&mut pending, selected)?,
            }
        }

        info!(
            executors_used = self
                .system
                .executors
                .iter()
                .filter(|exe| !exe.is_empty())
                .count(),
            "=== assignment complete ==="
        );
        Ok(())
    }

    /// Greedy prefix of `pending` worth at most one core of load.
    ///
    /// Always takes at least the first node — an oversized single node
    /// must reach the forced path rather than starve the loop.
    fn select_nodes(&self, pending: &[usize]) -> Vec<usize> {
        let mut selected = Vec::new();
        let mut total = 0.0;
        for &node in pending {
            let utilization = self.system.nodes[node].utilization;
            if !selected.is_empty() && total + utilization > 1.0 {
                break;
            }
            selected.push(node);
            total += utilization;
        }
        selected
    }

    // ── Spawn path ────────────────────────────────────────────────────────────

    /// Load the selection onto the empty `executor` and attach it to a
    /// fitting core that keeps the core-level orderings intact.
    fn place_via_spawn(
        &mut self,
        pending: &mut Vec<usize>,
        mut selected: Vec<usize>,
        executor: usize,
    ) -> Result<(), PlanError> {
        debug!(executor, selection = ?selected, "spawn placement");
        loop {
            // Tentatively (re)load the current selection.
            self.system.reset_executor(executor);
            self.system.assign_nodes_to_executor(executor, &selected);

            let fitting = self.fitting_cores(self.system.executors[executor].utilization);
            if fitting.is_empty() {
                if selected.len() > 1 {
                    self.drop_lowest_priority_node(&mut selected)?;
                    continue;
                }
                // A single node no core can absorb: forced placement.
                self.system.reset_executor(executor);
                self.force_assign_node(selected[0])?;
                break;
            }

            let mut placed = false;
            for &core in &fitting {
                if satisfies_core_strategies(
                    self.system,
                    core,
                    &[CorePlacement::executor(executor)],
                )? {
                    self.system.attach_executor_to_core(core, executor);
                    debug!(executor, core, "executor attached");
                    placed = true;
                    break;
                }
            }
            if placed {
                break;
            }

            // No fitting core keeps the orderings. Collapse the least
            // utilized one to simplify its structure and retry; once it is
            // down to a single executor, collapsing can open nothing more,
            // so commit there and merge — one executor per core satisfies
            // the core-level orderings by construction.
            let target = fitting[0];
            if self.system.cores[target].executors.len() <= 1 {
                warn!(
                    executor,
                    core = target,
                    "no core accepts the executor; committing and collapsing"
                );
                self.system.attach_executor_to_core(target, executor);
                self.merge_core_executors(target);
                break;
            }
            self.merge_core_executors(target);
        }

        remove_placed(pending, &selected);
        Ok(())
    }

    // ── Reuse path ────────────────────────────────────────────────────────────

    /// Place the selection on an already-busy executor whose core can
    /// absorb it, or free executors up by collapsing a core.
    fn place_via_reuse(
        &mut self,
        pending: &mut Vec<usize>,
        mut selected: Vec<usize>,
    ) -> Result<(), PlanError> {
        debug!(selection = ?selected, "reuse placement");
        loop {
            let total: f64 = selected
                .iter()
                .map(|&node| self.system.nodes[node].utilization)
                .sum();

            // Executors hosted on cores that can absorb the whole selection.
            let mut candidates: Vec<(usize, usize)> = Vec::new();
            for core in &self.system.cores {
                if core.utilization + total <= 1.0 {
                    candidates.extend(core.executors.iter().map(|&exe| (exe, core.id)));
                }
            }

            if candidates.is_empty() {
                if selected.len() > 1 {
                    self.drop_lowest_priority_node(&mut selected)?;
                    continue;
                }
                self.force_assign_node(selected[0])?;
                remove_placed(pending, &selected);
                return Ok(());
            }

            candidates.sort_by(|&(a, _), &(b, _)| {
                self.system.executors[a]
                    .utilization
                    .total_cmp(&self.system.executors[b].utilization)
                    .then(a.cmp(&b))
            });

            for &(executor, core) in &candidates {
                let placement = CorePlacement::with_nodes(executor, selected.clone());
                if satisfies_core_strategies(self.system, core, std::slice::from_ref(&placement))?
                    && satisfies_executor_strategies(self.system, executor, &selected)?
                {
                    self.system.assign_nodes_to_executor(executor, &selected);
                    debug!(executor, core, selection = ?selected, "nodes placed on busy executor");
                    remove_placed(pending, &selected);
                    return Ok(());
                }
            }

            // Nothing passes. Collapsing the least-utilized candidate's
            // core frees its other executors for the spawn path next
            // round; the selection stays pending.
            let (_, core) = candidates[0];
            if self.system.cores[core].executors.len() > 1 {
                self.merge_core_executors(core);
                warn!(core, "no reuse placement satisfied the orderings; core collapsed, selection deferred");
                return Ok(());
            }

            // Collapsing would change nothing; fall back to shrinking, and
            // force the last node when the selection is already singular.
            if selected.len() > 1 {
                self.drop_lowest_priority_node(&mut selected)?;
                continue;
            }
            self.force_assign_node(selected[0])?;
            remove_placed(pending, &selected);
            return Ok(());
        }
    }

    // ── Forced resolution ─────────────────────────────────────────────────────

    /// Put `node` on the least-utilized occupied core regardless of the
    /// utilization bound, then collapse that core to a single executor.
    ///
    /// The carrier is the lowest-id empty executor when one exists;
    /// otherwise the node is loaded straight onto the core's highest-id
    /// executor — the one the collapse elects as survivor anyway.
    fn force_assign_node(&mut self, node: usize) -> Result<(), PlanError> {
        let target = self.lowest_utilization_core();
        warn!(
            node,
            core = target,
            "forcing node placement; utilization bound waived"
        );

        match self.system.lowest_empty_executor() {
            Some(executor) => {
                self.system.assign_nodes_to_executor(executor, &[node]);
                self.system.attach_executor_to_core(target, executor);
            }
            None => {
                let carrier = self.system.cores[target].executors.iter().copied().max();
                match carrier {
                    Some(executor) => self.system.assign_nodes_to_executor(executor, &[node]),
                    // Unreachable with a non-empty pool: a busy executor is
                    // always hosted, so some core is occupied.
                    None => return Err(PlanError::NoExecutors),
                }
            }
        }

        self.merge_core_executors(target);
        Ok(())
    }

    /// Collapse every executor on `core_id` into the one with the lowest
    /// fixed precedence (highest id), preserving the callback union.
    ///
    /// The other executors return to the empty pool; the core ends up
    /// hosting exactly one executor.
    fn merge_core_executors(&mut self, core_id: usize) {
        let members = self.system.cores[core_id].executors.clone();
        let Some(&survivor) = members.iter().max() else {
            return;
        };
        if members.len() == 1 {
            return;
        }

        let mut moved: Vec<usize> = Vec::new();
        for &executor in &members {
            moved.extend(self.system.executors[executor].callbacks.iter().copied());
        }
        moved.sort_unstable();
        moved.dedup();

        for &executor in &members {
            self.system.executors[executor].reset();
        }
        self.system.cores[core_id].reset();

        let System {
            callbacks,
            executors,
            ..
        } = self.system;
        executors[survivor].assign(&moved, callbacks);
        self.system.attach_executor_to_core(core_id, survivor);

        info!(
            core = core_id,
            survivor,
            merged = members.len(),
            callbacks = moved.len(),
            "core executors collapsed"
        );
    }

    // ── Shared helpers ────────────────────────────────────────────────────────

    /// Cores that can absorb `extra` more load, least utilized first
    /// (ties by id).
    fn fitting_cores(&self, extra: f64) -> Vec<usize> {
        let mut fitting: Vec<usize> = self
            .system
            .cores
            .iter()
            .filter(|core| core.utilization + extra <= 1.0)
            .map(|core| core.id)
            .collect();
        fitting.sort_by(|&a, &b| {
            self.system.cores[a]
                .utilization
                .total_cmp(&self.system.cores[b].utilization)
                .then(a.cmp(&b))
        });
        fitting
    }

    /// Least-utilized core among those hosting at least one executor,
    /// falling back to the overall least-utilized core when none is
    /// occupied yet (ties by id).
    fn lowest_utilization_core(&self) -> usize {
        let by_utilization = |a: &&crate::model::Core, b: &&crate::model::Core| {
            a.utilization.total_cmp(&b.utilization).then(a.id.cmp(&b.id))
        };
        self.system
            .cores
            .iter()
            .filter(|core| !core.executors.is_empty())
            .min_by(by_utilization)
            .or_else(|| self.system.cores.iter().min_by(by_utilization))
            .map(|core| core.id)
            .unwrap_or(0)
    }

    /// Drop the selected node carrying the numerically smallest callback
    /// priority.
    fn drop_lowest_priority_node(&self, selected: &mut Vec<usize>) -> Result<(), PlanError> {
        let mut lowest: Option<(u32, usize)> = None;
        for &node in selected.iter() {
            for &cb in &self.system.nodes[node].callbacks {
                let priority = self.system.callbacks[cb]
                    .priority
                    .ok_or(ConsistencyFault::MissingPriority { callback: cb })?;
                if lowest.map_or(true, |(current, _)| priority < current) {
                    lowest = Some((priority, node));
                }
            }
        }
        if let Some((_, node)) = lowest {
            selected.retain(|&n| n != node);
            debug!(dropped = node, remaining = ?selected, "selection shrunk");
        }
        Ok(())
    }
}

/// Remove every placed node from the pending list, preserving order.
fn remove_placed(pending: &mut Vec<usize>, placed: &[usize]) {
    pending.retain(|node| !placed.contains(node));
}

// ── Tests ─────────────────────────────────────────────────────────────────────
