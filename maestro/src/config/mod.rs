/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Workload configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! num_cores: 2
//! num_executors: 3
//! callbacks:
//!   cb0: { wcet: 1, period: 10, node_id: 0, chain_id: 0 }
//!   cb1: { wcet: 1, node_id: 1, chain_id: 0 }
//! ```
//!
//! Callback keys are `cb<id>` with dense ids `0..n`; a missing (or zero)
//! `period` marks a regular callback whose period is derived from its
//! chain's timer callback. Key format, id density and the per-chain timer
//! invariants are validated during entity construction
//! ([`System::from_config`](crate::model::System::from_config)), not here —
//! this module only gets the file into memory.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// One callback record as it appears in the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackSpec {
    /// Worst-case execution time.
    pub wcet: u64,

    /// Recurrence period. Defaults to 0 when absent from YAML, marking a
    /// regular callback.
    #[serde(default)]
    pub period: u64,

    /// Node this callback belongs to.
    pub node_id: usize,

    /// Chain this callback belongs to.
    pub chain_id: usize,
}

/// The parsed workload configuration the planner consumes.
///
/// `callbacks` is a `BTreeMap` so every walk over the records is
/// deterministic regardless of the key order in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanConfig {
    /// Size of the pre-numbered core pool.
    pub num_cores: usize,

    /// Size of the pre-numbered executor pool.
    pub num_executors: usize,

    /// Callback records keyed `cb<id>`.
    pub callbacks: BTreeMap<String, CallbackSpec>,
}

impl PlanConfig {
    /// Parses `path` as a workload configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot open workload file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML file: {}", path.display()))?;

        info!(
            num_cores = config.num_cores,
            num_executors = config.num_executors,
            callbacks = config.callbacks.len(),
            "workload configuration loaded from {}",
            path.display()
        );

        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
