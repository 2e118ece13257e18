//! Entity model for the allocation planner.
//!
//! Five entity kinds, all arena-owned by [`System`]:
//!
//! ```text
//! Callback ──grouped by chain_id──► Chain   (causal order, priorities)
//!          ──grouped by node_id───► Node    (assignment granularity)
//! Executor ◄──assigned callbacks            (fixed pool, id = priority)
//! Core     ◄──hosted executors              (fixed pool)
//! ```
//!
//! Relations between entities are integer ids indexing the arena `Vec`s,
//! never owning references, so merges and resets cannot dangle. The
//! `callback → executor` and `executor → core` back-links are rewritten on
//! every `assign` and the list side (`Executor::callbacks`,
//! `Core::executors`) is always the authoritative relation.
//!
//! Construction validates the input invariants once, before any further
//! processing: dense ids, positive WCETs, exactly one timer callback per
//! chain sitting at the chain head, and a derivable period for every
//! regular callback. A [`System`] that exists is well-formed.

pub mod callback;
pub mod chain;
pub mod core;
pub mod executor;
pub mod node;

pub use self::core::Core;
pub use callback::Callback;
pub use chain::Chain;
pub use executor::Executor;
pub use node::Node;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::config::PlanConfig;

// ── Input malformation ────────────────────────────────────────────────────────

/// Fatal input problems detected while building a [`System`].
///
/// Every variant is an input-file defect, not a planner state: the planner
/// never starts on a graph that failed construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// The `callbacks` mapping was empty.
    #[error("input contains no callbacks")]
    NoCallbacks,

    /// A callback key could not be parsed as `cb<id>`.
    #[error("callback key '{key}' is not of the form cb<id>")]
    InvalidCallbackKey { key: String },

    /// Two keys resolved to the same callback id (e.g. `cb1` and `cb01`).
    #[error("callback id {id} appears more than once")]
    DuplicateCallbackId { id: usize },

    /// Callback ids must be dense `0..n`.
    #[error("callback ids are not dense: cb{id} is missing")]
    CallbackIdGap { id: usize },

    /// A callback arrived with a zero worst-case execution time.
    #[error("callback {callback} has a zero WCET")]
    ZeroWcet { callback: usize },

    /// A chain holds regular callbacks but no timer callback to derive
    /// their period from.
    #[error("chain {chain} has no timer callback to derive periods from")]
    MissingTimer { chain: usize },

    /// A chain holds more than one timer callback.
    #[error("chain {chain} has more than one timer callback")]
    DuplicateTimer { chain: usize },

    /// Chain ids must be dense `0..n`; a gap is an empty chain.
    #[error("chain ids are not dense: chain {chain} has no callbacks")]
    EmptyChain { chain: usize },

    /// Node ids must be dense `0..n`; a gap is an empty node.
    #[error("node ids are not dense: node {node} has no callbacks")]
    EmptyNode { node: usize },

    /// The chain's timer callback must be its lowest-id member (the chain
    /// head in causal order).
    #[error("chain {chain}'s timer callback is not its lowest-id callback")]
    TimerNotChainHead { chain: usize },
}

// ── System ────────────────────────────────────────────────────────────────────

/// The complete entity graph the planner works on.
///
/// Every `Vec` is indexed by the entity's id. Built once from the input
/// configuration and mutated in place by priority assignment and the
/// assignment engine.
#[derive(Debug, Clone)]
pub struct System {
    pub callbacks: Vec<Callback>,
    pub chains: Vec<Chain>,
    pub nodes: Vec<Node>,
    pub executors: Vec<Executor>,
    pub cores: Vec<Core>,
}

impl System {
    /// Build and validate the entity graph from a parsed configuration.
    ///
    /// # Errors
    /// Any [`ModelError`] — the input is rejected wholesale rather than
    /// letting the planner start on an inconsistent graph.
    pub fn from_config(config: &PlanConfig) -> Result<Self, ModelError> {
        if config.callbacks.is_empty() {
            return Err(ModelError::NoCallbacks);
        }

        // ── Parse callback keys into dense ids ────────────────────────────────
        let mut by_id: BTreeMap<usize, &crate::config::CallbackSpec> = BTreeMap::new();
        for (key, spec) in &config.callbacks {
            let id = key
                .strip_prefix("cb")
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| ModelError::InvalidCallbackKey { key: key.clone() })?;
            if by_id.insert(id, spec).is_some() {
                return Err(ModelError::DuplicateCallbackId { id });
            }
        }
        for expected in 0..by_id.len() {
            if !by_id.contains_key(&expected) {
                return Err(ModelError::CallbackIdGap { id: expected });
            }
        }

        // ── Callbacks ─────────────────────────────────────────────────────────
        let mut callbacks: Vec<Callback> = Vec::with_capacity(by_id.len());
        for (&id, spec) in &by_id {
            if spec.wcet == 0 {
                return Err(ModelError::ZeroWcet { callback: id });
            }
            callbacks.push(Callback {
                id,
                wcet: spec.wcet,
                period: spec.period,
                node_id: spec.node_id,
                chain_id: spec.chain_id,
                is_timer: spec.period != 0,
                priority: None,
                assigned_executor: None,
            });
        }

        Self::derive_periods(&mut callbacks)?;
        let chains = Self::build_chains(&callbacks)?;
        let nodes = Self::build_nodes(&callbacks)?;

        let executors = (0..config.num_executors).map(Executor::new).collect();
        let cores = (0..config.num_cores).map(Core::new).collect();

        debug!(
            callbacks = callbacks.len(),
            chains = chains.len(),
            nodes = nodes.len(),
            executors = config.num_executors,
            cores = config.num_cores,
            "entity graph built"
        );

        Ok(Self {
            callbacks,
            chains,
            nodes,
            executors,
            cores,
        })
    }

    /// Give every regular callback its chain's timer period.
    ///
    /// Runs before grouping so all derived utilizations are final.
    fn derive_periods(callbacks: &mut [Callback]) -> Result<(), ModelError> {
        let mut chain_period: BTreeMap<usize, u64> = BTreeMap::new();
        for cb in callbacks.iter() {
            if cb.is_timer && chain_period.insert(cb.chain_id, cb.period).is_some() {
                return Err(ModelError::DuplicateTimer { chain: cb.chain_id });
            }
        }
        for cb in callbacks.iter_mut() {
            if !cb.is_timer {
                cb.period = *chain_period
                    .get(&cb.chain_id)
                    .ok_or(ModelError::MissingTimer { chain: cb.chain_id })?;
            }
        }
        Ok(())
    }

    fn build_chains(callbacks: &[Callback]) -> Result<Vec<Chain>, ModelError> {
        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for cb in callbacks {
            members.entry(cb.chain_id).or_default().push(cb.id);
        }
        let count = members.len();
        let mut chains = Vec::with_capacity(count);
        for id in 0..count {
            // Iteration over `callbacks` is id-ascending, so each member
            // list is already in causal order.
            let callbacks_of_chain = members
                .remove(&id)
                .ok_or(ModelError::EmptyChain { chain: id })?;
            if !callbacks[callbacks_of_chain[0]].is_timer {
                return Err(ModelError::TimerNotChainHead { chain: id });
            }
            let wcet_sum = callbacks_of_chain.iter().map(|&cb| callbacks[cb].wcet).sum();
            chains.push(Chain {
                id,
                callbacks: callbacks_of_chain,
                priority: None,
                wcet_sum,
            });
        }
        Ok(chains)
    }

    fn build_nodes(callbacks: &[Callback]) -> Result<Vec<Node>, ModelError> {
        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for cb in callbacks {
            members.entry(cb.node_id).or_default().push(cb.id);
        }
        let count = members.len();
        let mut nodes = Vec::with_capacity(count);
        for id in 0..count {
            let callbacks_of_node = members
                .remove(&id)
                .ok_or(ModelError::EmptyNode { node: id })?;
            let utilization = callbacks_of_node
                .iter()
                .map(|&cb| callbacks[cb].utilization())
                .sum();
            nodes.push(Node {
                id,
                callbacks: callbacks_of_node,
                utilization,
                highest_priority: None,
            });
        }
        Ok(nodes)
    }

    // ── Engine-facing mutation helpers ────────────────────────────────────────
    //
    // These wrap the entity-level `assign`/`reset` primitives so every
    // derived value (executor utilization, hosting core utilization) is
    // consistent after each call.

    /// Assign the given nodes' callbacks to `executor_id` and refresh the
    /// hosting core's utilization if the executor is currently hosted.
    pub fn assign_nodes_to_executor(&mut self, executor_id: usize, node_ids: &[usize]) {
        let ids = self.callbacks_of_nodes(node_ids);
        self.executors[executor_id].assign(&ids, &mut self.callbacks);
        self.refresh_host_core(executor_id);
    }

    /// Empty `executor_id` and refresh its hosting core, if any.
    pub fn reset_executor(&mut self, executor_id: usize) {
        self.executors[executor_id].reset();
        self.refresh_host_core(executor_id);
    }

    /// Attach `executor_id` to `core_id`.
    pub fn attach_executor_to_core(&mut self, core_id: usize, executor_id: usize) {
        self.cores[core_id].assign(executor_id, &mut self.executors);
    }

    /// The core whose executor list contains `executor_id`, if any. Walks
    /// the authoritative list side rather than trusting the back-link.
    pub fn host_core_of(&self, executor_id: usize) -> Option<usize> {
        self.cores
            .iter()
            .find(|core| core.executors.contains(&executor_id))
            .map(|core| core.id)
    }

    /// Lowest-id executor with no callbacks, if any.
    pub fn lowest_empty_executor(&self) -> Option<usize> {
        self.executors.iter().find(|exe| exe.is_empty()).map(|exe| exe.id)
    }

    /// All callback ids of the given nodes, in node order.
    pub fn callbacks_of_nodes(&self, node_ids: &[usize]) -> Vec<usize> {
        node_ids
            .iter()
            .flat_map(|&node| self.nodes[node].callbacks.iter().copied())
            .collect()
    }

    fn refresh_host_core(&mut self, executor_id: usize) {
        if let Some(core_id) = self.host_core_of(executor_id) {
            self.cores[core_id].refresh_utilization(&self.executors);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CallbackSpec, PlanConfig};

    fn spec(wcet: u64, period: u64, node_id: usize, chain_id: usize) -> CallbackSpec {
        CallbackSpec {
            wcet,
            period,
            node_id,
            chain_id,
        }
    }

    /// The two-chain workload used across the planner tests:
    /// chain 0 = [cb0 timer 1/10, cb1 regular 1], chain 1 = [cb2 timer 2/20,
    /// cb3 regular 2], one node per chain.
    fn two_chain_config(num_executors: usize, num_cores: usize) -> PlanConfig {
        PlanConfig {
            num_cores,
            num_executors,
            callbacks: [
                ("cb0".to_string(), spec(1, 10, 0, 0)),
                ("cb1".to_string(), spec(1, 0, 0, 0)),
                ("cb2".to_string(), spec(2, 20, 1, 1)),
                ("cb3".to_string(), spec(2, 0, 1, 1)),
            ]
            .into_iter()
            .collect(),
        }
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn builds_two_chain_workload() {
        let system = System::from_config(&two_chain_config(2, 1)).unwrap();

        assert_eq!(system.callbacks.len(), 4);
        assert_eq!(system.chains.len(), 2);
        assert_eq!(system.nodes.len(), 2);
        assert_eq!(system.executors.len(), 2);
        assert_eq!(system.cores.len(), 1);

        assert_eq!(system.chains[0].callbacks, vec![0, 1]);
        assert_eq!(system.chains[0].timer(), 0);
        assert_eq!(system.chains[0].wcet_sum, 2);
        assert_eq!(system.chains[1].wcet_sum, 4);
    }

    #[test]
    fn regular_callbacks_inherit_chain_period() {
        let system = System::from_config(&two_chain_config(2, 1)).unwrap();
        assert_eq!(system.callbacks[1].period, 10);
        assert_eq!(system.callbacks[3].period, 20);
        assert!(!system.callbacks[1].is_timer);
        assert!(system.callbacks[2].is_timer);
    }

    #[test]
    fn node_utilization_is_member_sum() {
        let system = System::from_config(&two_chain_config(2, 1)).unwrap();
        // node 0: 1/10 + 1/10; node 1: 2/20 + 2/20
        assert!((system.nodes[0].utilization - 0.2).abs() < 1e-12);
        assert!((system.nodes[1].utilization - 0.2).abs() < 1e-12);
    }

    // ── Input malformation ────────────────────────────────────────────────────

    #[test]
    fn empty_input_is_rejected() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: Default::default(),
        };
        assert_eq!(
            System::from_config(&config).unwrap_err(),
            ModelError::NoCallbacks
        );
    }

    #[test]
    fn malformed_callback_key_is_rejected() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: [("callback_zero".to_string(), spec(1, 10, 0, 0))]
                .into_iter()
                .collect(),
        };
        assert!(matches!(
            System::from_config(&config).unwrap_err(),
            ModelError::InvalidCallbackKey { .. }
        ));
    }

    #[test]
    fn callback_id_gap_is_rejected() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: [
                ("cb0".to_string(), spec(1, 10, 0, 0)),
                ("cb2".to_string(), spec(1, 0, 0, 0)),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            System::from_config(&config).unwrap_err(),
            ModelError::CallbackIdGap { id: 1 }
        );
    }

    #[test]
    fn chain_without_timer_is_rejected() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: [
                ("cb0".to_string(), spec(1, 10, 0, 0)),
                ("cb1".to_string(), spec(1, 0, 1, 1)), // chain 1 has no timer
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            System::from_config(&config).unwrap_err(),
            ModelError::MissingTimer { chain: 1 }
        );
    }

    #[test]
    fn chain_with_two_timers_is_rejected() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: [
                ("cb0".to_string(), spec(1, 10, 0, 0)),
                ("cb1".to_string(), spec(1, 20, 0, 0)),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            System::from_config(&config).unwrap_err(),
            ModelError::DuplicateTimer { chain: 0 }
        );
    }

    #[test]
    fn timer_must_head_its_chain() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: [
                ("cb0".to_string(), spec(1, 0, 0, 0)), // regular before the timer
                ("cb1".to_string(), spec(1, 10, 0, 0)),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            System::from_config(&config).unwrap_err(),
            ModelError::TimerNotChainHead { chain: 0 }
        );
    }

    #[test]
    fn zero_wcet_is_rejected() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: [("cb0".to_string(), spec(0, 10, 0, 0))]
                .into_iter()
                .collect(),
        };
        assert_eq!(
            System::from_config(&config).unwrap_err(),
            ModelError::ZeroWcet { callback: 0 }
        );
    }

    #[test]
    fn chain_id_gap_is_rejected() {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 1,
            callbacks: [
                ("cb0".to_string(), spec(1, 10, 0, 0)),
                ("cb1".to_string(), spec(1, 20, 1, 2)), // chain 1 missing
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            System::from_config(&config).unwrap_err(),
            ModelError::EmptyChain { chain: 1 }
        );
    }

    // ── Derived-value conservation through mutations ──────────────────────────

    #[test]
    fn executor_and_core_utilization_track_assignments() {
        let mut system = System::from_config(&two_chain_config(2, 1)).unwrap();
        // Priorities are needed for the executor sort key only; any unique
        // numbering works for this test.
        for (i, cb) in system.callbacks.iter_mut().enumerate() {
            cb.priority = Some(i as u32 + 1);
        }

        system.assign_nodes_to_executor(0, &[0]);
        assert!((system.executors[0].utilization - 0.2).abs() < 1e-12);

        system.attach_executor_to_core(0, 0);
        assert!((system.cores[0].utilization - 0.2).abs() < 1e-12);

        // Growing a hosted executor must flow into the core total.
        system.assign_nodes_to_executor(0, &[1]);
        assert!((system.executors[0].utilization - 0.4).abs() < 1e-12);
        assert!((system.cores[0].utilization - 0.4).abs() < 1e-12);

        system.reset_executor(0);
        assert_eq!(system.executors[0].utilization, 0.0);
        assert_eq!(system.cores[0].utilization, 0.0);
    }

    #[test]
    fn lowest_empty_executor_prefers_smallest_id() {
        let mut system = System::from_config(&two_chain_config(3, 1)).unwrap();
        for (i, cb) in system.callbacks.iter_mut().enumerate() {
            cb.priority = Some(i as u32 + 1);
        }
        assert_eq!(system.lowest_empty_executor(), Some(0));

        system.assign_nodes_to_executor(0, &[0]);
        assert_eq!(system.lowest_empty_executor(), Some(1));
    }
}
