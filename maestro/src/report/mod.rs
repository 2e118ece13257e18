/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Result tables.
//!
//! Renders the final entity graph into five CSV files in the output
//! directory (created if absent):
//!
//! * `callback_info.csv` — per-callback priority and executor assignment
//! * `chain_info.csv`    — member callbacks, priority, WCET sum
//! * `node_info.csv`     — member callbacks, utilization, sort key
//! * `executor_info.csv` — member callbacks, utilization, hosting core
//! * `core_info.csv`     — hosted executors, utilization
//!
//! Member-id lists are rendered as a quoted `[a, b]` field so the files
//! stay valid CSV. The planner has no dependency on this format; the
//! tables are purely for downstream consumption.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::model::System;

/// Write all five result tables for `system` into `output_dir`.
///
/// # Errors
/// Returns an error if the directory cannot be created or a table cannot
/// be written.
pub fn write_all_info(output_dir: &Path, system: &System) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output directory: {}", output_dir.display()))?;

    write_table(output_dir, "callback_info.csv", callback_table(system))?;
    write_table(output_dir, "chain_info.csv", chain_table(system))?;
    write_table(output_dir, "node_info.csv", node_table(system))?;
    write_table(output_dir, "executor_info.csv", executor_table(system))?;
    write_table(output_dir, "core_info.csv", core_table(system))?;

    info!("result tables written to {}", output_dir.display());
    Ok(())
}

fn write_table(output_dir: &Path, name: &str, content: String) -> Result<()> {
    let path = output_dir.join(name);
    fs::write(&path, content).with_context(|| format!("cannot write {}", path.display()))
}

// ── Per-table rendering ───────────────────────────────────────────────────────

fn callback_table(system: &System) -> String {
    let mut rows =
        vec!["callback_id,wcet,period,priority,node_id,chain_id,is_timer_callback,assigned_executor_id".to_string()];
    for cb in &system.callbacks {
        rows.push(format!(
            "{},{},{},{},{},{},{},{}",
            cb.id,
            cb.wcet,
            cb.period,
            opt(cb.priority),
            cb.node_id,
            cb.chain_id,
            cb.is_timer,
            opt(cb.assigned_executor),
        ));
    }
    finish(rows)
}

fn chain_table(system: &System) -> String {
    let mut rows = vec!["chain_id,contain_callback_ids,priority,wcet_sum".to_string()];
    for chain in &system.chains {
        rows.push(format!(
            "{},{},{},{}",
            chain.id,
            id_list(&chain.callbacks),
            opt(chain.priority),
            chain.wcet_sum,
        ));
    }
    finish(rows)
}

fn node_table(system: &System) -> String {
    let mut rows = vec!["node_id,contain_callback_ids,utilization,highest_priority".to_string()];
    for node in &system.nodes {
        rows.push(format!(
            "{},{},{},{}",
            node.id,
            id_list(&node.callbacks),
            node.utilization,
            opt(node.highest_priority),
        ));
    }
    finish(rows)
}

fn executor_table(system: &System) -> String {
    let mut rows =
        vec!["executor_id,contain_callback_ids,priority,utilization,assigned_core_id".to_string()];
    for executor in &system.executors {
        // The hosting relation is read from the core side; the back-link
        // can be stale after a reset.
        rows.push(format!(
            "{},{},{},{},{}",
            executor.id,
            id_list(&executor.callbacks),
            executor.id,
            executor.utilization,
            opt(system.host_core_of(executor.id)),
        ));
    }
    finish(rows)
}

fn core_table(system: &System) -> String {
    let mut rows = vec!["core_id,contain_executor_ids,utilization".to_string()];
    for core in &system.cores {
        rows.push(format!(
            "{},{},{}",
            core.id,
            id_list(&core.executors),
            core.utilization,
        ));
    }
    finish(rows)
}

// ── Field formatting ──────────────────────────────────────────────────────────

/// `[a, b]` list rendering, quoted so the comma survives CSV parsing.
fn id_list(ids: &[usize]) -> String {
    let joined = ids
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("\"[{joined}]\"")
}

/// Unset optional fields render as an empty CSV field.
fn opt<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(rows: Vec<String>) -> String {
    rows.join("\n") + "\n"
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CallbackSpec, PlanConfig};
    use crate::planner;

    fn spec(wcet: u64, period: u64, node_id: usize, chain_id: usize) -> CallbackSpec {
        CallbackSpec {
            wcet,
            period,
            node_id,
            chain_id,
        }
    }

    fn planned_system() -> System {
        let config = PlanConfig {
            num_cores: 1,
            num_executors: 2,
            callbacks: [
                ("cb0".to_string(), spec(1, 10, 0, 0)),
                ("cb1".to_string(), spec(1, 0, 0, 0)),
                ("cb2".to_string(), spec(2, 20, 1, 1)),
                ("cb3".to_string(), spec(2, 0, 1, 1)),
            ]
            .into_iter()
            .collect(),
        };
        let mut system = System::from_config(&config).unwrap();
        planner::plan(&mut system).unwrap();
        system
    }

    #[test]
    fn writes_all_five_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_all_info(dir.path(), &planned_system()).unwrap();

        for name in [
            "callback_info.csv",
            "chain_info.csv",
            "node_info.csv",
            "executor_info.csv",
            "core_info.csv",
        ] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results").join("run1");
        write_all_info(&nested, &planned_system()).unwrap();
        assert!(nested.join("callback_info.csv").exists());
    }

    #[test]
    fn callback_rows_carry_priority_and_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let system = planned_system();
        write_all_info(dir.path(), &system).unwrap();

        let table = fs::read_to_string(dir.path().join("callback_info.csv")).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines[0],
            "callback_id,wcet,period,priority,node_id,chain_id,is_timer_callback,assigned_executor_id"
        );
        assert_eq!(lines.len(), 5);

        let executor = system.callbacks[0].assigned_executor.unwrap();
        assert_eq!(lines[1], format!("0,1,10,1,0,0,true,{executor}"));
        // cb1's period was derived from its chain's timer
        assert!(lines[2].starts_with("1,1,10,2,"));
    }

    #[test]
    fn member_lists_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        write_all_info(dir.path(), &planned_system()).unwrap();

        let table = fs::read_to_string(dir.path().join("chain_info.csv")).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[1], "0,\"[0, 1]\",1,2");
        assert_eq!(lines[2], "1,\"[2, 3]\",3,4");
    }

    #[test]
    fn executor_hosting_comes_from_the_core_side() {
        let dir = tempfile::tempdir().unwrap();
        let system = planned_system();
        write_all_info(dir.path(), &system).unwrap();

        let table = fs::read_to_string(dir.path().join("executor_info.csv")).unwrap();
        for executor in &system.executors {
            let row = table
                .lines()
                .nth(executor.id + 1)
                .expect("one row per executor");
            let hosted = opt(system.host_core_of(executor.id));
            assert!(row.ends_with(&format!(",{hosted}")), "row: {row}");
        }
    }

    #[test]
    fn core_rows_sum_hosted_utilization() {
        let dir = tempfile::tempdir().unwrap();
        let system = planned_system();
        write_all_info(dir.path(), &system).unwrap();

        let table = fs::read_to_string(dir.path().join("core_info.csv")).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "core_id,contain_executor_ids,utilization");
        // both 0.2-utilization nodes ended up on the single core
        assert!(lines[1].starts_with("0,"));
        assert!(lines[1].ends_with(&system.cores[0].utilization.to_string()));
    }
}
