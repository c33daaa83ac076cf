//! Omega 调度器（乐观并发）
//!
//! 每个实例持有共享账本的私有影子副本，对影子运行与 monolithic 相同的
//! 放置算法，再把整批 claim 乐观提交回共享账本。任一 claim 的版本号
//! 过期则整批作废、不留部分进度，该次尝试计为重试事务。多个实例争抢
//! 同一账本正是预期场景。

use super::{Scheduler, SchedulerCore, requeue_or_abandon, start_next_job};
use crate::cell::{CellState, Job, SchedulerId};
use crate::cluster::events::schedule_end_events;
use crate::error::CoreError;
use crate::sim::Simulator;
use std::any::Any;
use std::collections::HashMap;
use tracing::debug;

pub struct OmegaScheduler {
    core: SchedulerCore,
    /// 共享账本的私有深拷贝，每次提交尝试后重新同步。
    shadow: Option<CellState>,
}

impl OmegaScheduler {
    pub fn new(
        name: impl Into<String>,
        constant_think_times: HashMap<String, f64>,
        per_task_think_times: HashMap<String, f64>,
        num_machines_to_blacklist: usize,
        seed: u64,
    ) -> Self {
        Self {
            core: SchedulerCore::new(
                name,
                constant_think_times,
                per_task_think_times,
                num_machines_to_blacklist,
                seed,
            ),
            shadow: None,
        }
    }
}

impl Scheduler for OmegaScheduler {
    fn name(&self) -> &str {
        self.core.name()
    }
    fn core(&self) -> &SchedulerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn on_attach(&mut self, id: SchedulerId, cell: &CellState) {
        self.core.attach(id);
        self.shadow = Some(cell.clone());
    }

    fn on_job_arrival(
        &mut self,
        job: Job,
        _cell: &mut CellState,
        sim: &mut Simulator,
    ) -> Result<(), CoreError> {
        self.core.enqueue(job, sim.now());
        start_next_job(&mut self.core, sim)
    }

    fn on_think_time_elapsed(
        &mut self,
        mut job: Job,
        think_secs: f64,
        cell: &mut CellState,
        sim: &mut Simulator,
    ) -> Result<(), CoreError> {
        job.num_scheduling_attempts += 1;
        job.num_task_scheduling_attempts += u64::from(job.unscheduled_tasks);

        let shadow = self.shadow.get_or_insert_with(|| cell.clone());
        let claims = self.core.schedule_job(&job, shadow)?;

        if claims.is_empty() {
            debug!(
                scheduler = self.core.name(),
                job = job.id,
                "影子状态里无处安放"
            );
            self.core.metrics.num_no_resources_found_attempts += 1;
            // 影子可能已过期，同步后再试
            self.shadow = Some(cell.clone());
        } else {
            let result = cell.commit(claims);
            let first_attempt = job.num_scheduling_attempts == 1;

            if !result.committed.is_empty() {
                schedule_end_events(&result.committed, sim);
                job.unscheduled_tasks -= result.committed.len() as u32;
                debug!(
                    scheduler = self.core.name(),
                    job = job.id,
                    committed = result.committed.len(),
                    remaining = job.unscheduled_tasks,
                    "乐观提交成功"
                );
                self.core.metrics.num_successful_transactions += 1;
                self.core.metrics.num_successful_task_transactions +=
                    result.committed.len() as u64;
                self.core.record_useful_time(&mut job, think_secs, first_attempt);
            }
            if !result.conflicted.is_empty() {
                self.core.metrics.num_failed_task_transactions += result.conflicted.len() as u64;
                if result.committed.is_empty() {
                    debug!(
                        scheduler = self.core.name(),
                        job = job.id,
                        conflicted = result.conflicted.len(),
                        "整批提交被并发修改打掉，计为重试事务"
                    );
                    self.core.metrics.num_retried_transactions += 1;
                    self.core.metrics.num_failed_transactions += 1;
                    self.core.record_wasted_time(&mut job, think_secs, first_attempt);
                }
            }

            // 提交尝试后无条件刷新影子
            self.shadow = Some(cell.clone());
        }

        requeue_or_abandon(&mut self.core, job, sim)?;

        self.core.scheduling = false;
        start_next_job(&mut self.core, sim)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
