//! Experiment spec consumed by the CLI binaries.
//!
//! Describes the cell dimensions, the per-workload think times and a
//! deterministic synthetic workload mix. Every field has a default so a
//! missing JSON file (or an empty object) reproduces the built-in
//! comparison experiment.

use crate::cell::{CellState, CommitMode, ConflictMode, Job, Workload};
use crate::error::CoreError;
use crate::sim::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExperimentSpec {
    #[serde(default)]
    pub cell: CellSpec,
    #[serde(default)]
    pub think_time: ThinkTimeSpec,
    #[serde(default)]
    pub workload: SyntheticWorkloadSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSpec {
    pub machines: usize,
    pub cpus_per_machine: f64,
    pub mem_per_machine: f64,
}

impl Default for CellSpec {
    fn default() -> Self {
        Self {
            machines: 2,
            cpus_per_machine: 4.0,
            mem_per_machine: 8000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkTimeSpec {
    pub constant: f64,
    pub per_task: f64,
}

impl Default for ThinkTimeSpec {
    fn default() -> Self {
        Self {
            constant: 0.15,
            per_task: 0.015,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobClassSpec {
    pub num_tasks: u32,
    pub cpus_per_task: f64,
    pub mem_per_task: f64,
}

/// A dense, mixed arrival stream: jobs cycle through the size classes and
/// arrive at a fixed spacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticWorkloadSpec {
    #[serde(default = "default_workload_name")]
    pub name: String,
    pub num_jobs: usize,
    pub arrival_spacing_secs: f64,
    pub task_duration_secs: f64,
    #[serde(default = "default_job_classes")]
    pub classes: Vec<JobClassSpec>,
}

fn default_workload_name() -> String {
    "Mixed".to_string()
}

fn default_job_classes() -> Vec<JobClassSpec> {
    vec![
        // large batch-like
        JobClassSpec {
            num_tasks: 2,
            cpus_per_task: 1.0,
            mem_per_task: 2000.0,
        },
        // medium interactive-like
        JobClassSpec {
            num_tasks: 2,
            cpus_per_task: 1.0,
            mem_per_task: 1500.0,
        },
        // small service-like
        JobClassSpec {
            num_tasks: 1,
            cpus_per_task: 0.6,
            mem_per_task: 1000.0,
        },
    ]
}

impl Default for SyntheticWorkloadSpec {
    fn default() -> Self {
        Self {
            name: default_workload_name(),
            num_jobs: 180,
            arrival_spacing_secs: 0.005,
            task_duration_secs: 50.0,
            classes: default_job_classes(),
        }
    }
}

impl ExperimentSpec {
    pub fn build_cell(&self, conflict_mode: &str, commit_mode: &str) -> Result<CellState, CoreError> {
        Ok(CellState::new(
            self.cell.machines,
            self.cell.cpus_per_machine,
            self.cell.mem_per_machine,
            ConflictMode::parse(conflict_mode)?,
            CommitMode::parse(commit_mode)?,
        ))
    }

    /// Think-time maps keyed by the synthetic workload's name.
    pub fn think_time_maps(&self) -> (HashMap<String, f64>, HashMap<String, f64>) {
        let mut constant = HashMap::new();
        let mut per_task = HashMap::new();
        constant.insert(self.workload.name.clone(), self.think_time.constant);
        per_task.insert(self.workload.name.clone(), self.think_time.per_task);
        (constant, per_task)
    }

    /// Builds a fresh workload instance. Each simulator run must get its own
    /// copy so job progress counters are never shared across runs.
    pub fn build_workload(&self) -> Workload {
        let spec = &self.workload;
        let classes = if spec.classes.is_empty() {
            default_job_classes()
        } else {
            spec.classes.clone()
        };

        let mut workload = Workload::new(spec.name.clone());
        for i in 0..spec.num_jobs {
            let class = &classes[i % classes.len()];
            workload.add_job(Job::new(
                1000 + i as u64,
                SimTime::from_secs_f64(i as f64 * spec.arrival_spacing_secs),
                class.num_tasks,
                SimTime::from_secs_f64(spec.task_duration_secs),
                spec.name.clone(),
                class.cpus_per_task,
                class.mem_per_task,
            ));
        }
        workload
    }
}
