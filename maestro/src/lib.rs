/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Maestro – static allocation planner for chain-ordered callback graphs.
//!
//! Computes a feasible mapping of callbacks onto single-threaded executors
//! and of executors onto CPU cores, honouring a per-core utilization bound
//! and the ordering strategies that keep independent chains
//! priority-correct when they share resources.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/   – YAML workload configuration
//! ├── model/    – Callback / Chain / Node / Executor / Core entities
//! ├── planner/  – priority assignment, ordering strategies, assignment engine
//! └── report/   – CSV result tables
//! ```

pub mod config;
pub mod model;
pub mod planner;
pub mod report;

use std::path::Path;

use anyhow::{Context, Result};

use config::PlanConfig;
use model::System;

/// Run the whole pipeline: load the workload from `input`, build the
/// entity graph, assign priorities, place every node, and write the
/// result tables into `output_dir`.
pub fn run(input: &Path, output_dir: &Path) -> Result<()> {
    let config = PlanConfig::from_file(input)?;
    let mut system = System::from_config(&config)
        .with_context(|| format!("invalid workload in {}", input.display()))?;

    planner::plan(&mut system).context("allocation planning failed")?;

    report::write_all_info(output_dir, &system)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pipeline_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("workload.yaml");
        let mut f = std::fs::File::create(&input).unwrap();
        f.write_all(
            br#"
num_cores: 1
num_executors: 2
callbacks:
  cb0: { wcet: 1, period: 10, node_id: 0, chain_id: 0 }
  cb1: { wcet: 1, node_id: 0, chain_id: 0 }
  cb2: { wcet: 2, period: 20, node_id: 1, chain_id: 1 }
  cb3: { wcet: 2, node_id: 1, chain_id: 1 }
"#,
        )
        .unwrap();

        let output = dir.path().join("output");
        run(&input, &output).unwrap();
        assert!(output.join("callback_info.csv").exists());
        assert!(output.join("core_info.csv").exists());
    }

    #[test]
    fn malformed_workload_fails_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("workload.yaml");
        // chain 0 has no timer callback
        std::fs::write(
            &input,
            "num_cores: 1\nnum_executors: 1\ncallbacks:\n  cb0: { wcet: 1, node_id: 0, chain_id: 0 }\n",
        )
        .unwrap();

        assert!(run(&input, &dir.path().join("output")).is_err());
    }
}
