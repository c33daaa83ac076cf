//! Monolithic 调度器
//!
//! 单一 FIFO 队列、单飞行中调度操作的集中式调度器，think time 到期后
//! 直接对真实账本运行放置算法。

use super::{Scheduler, SchedulerCore, requeue_or_abandon, start_next_job};
use crate::cell::{CellState, Job, SchedulerId};
use crate::cluster::events::schedule_end_events;
use crate::error::CoreError;
use crate::sim::Simulator;
use std::any::Any;
use std::collections::HashMap;
use tracing::debug;

pub struct MonolithicScheduler {
    core: SchedulerCore,
}

impl MonolithicScheduler {
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
        }
    }
}

impl Scheduler for MonolithicScheduler {
    fn name(&self) -> &str {
        self.core.name()
    }
    fn core(&self) -> &SchedulerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn on_attach(&mut self, id: SchedulerId, _cell: &CellState) {
        self.core.attach(id);
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

        let claims = self.core.schedule_job(&job, cell)?;
        if claims.is_empty() {
            debug!(
                scheduler = self.core.name(),
                job = job.id,
                remaining = job.unscheduled_tasks,
                "这次尝试一个任务都没放下，不计忙时"
            );
            self.core.metrics.num_no_resources_found_attempts += 1;
        } else {
            schedule_end_events(&claims, sim);
            job.unscheduled_tasks -= claims.len() as u32;
            debug!(
                scheduler = self.core.name(),
                job = job.id,
                placed = claims.len(),
                remaining = job.unscheduled_tasks,
                "任务已放置"
            );
            self.core.metrics.num_successful_transactions += 1;
            self.core.metrics.num_successful_task_transactions += claims.len() as u64;
            let first_attempt = job.num_scheduling_attempts == 1;
            self.core.record_useful_time(&mut job, think_secs, first_attempt);
        }

        requeue_or_abandon(&mut self.core, job, sim)?;

        self.core.scheduling = false;
        start_next_job(&mut self.core, sim)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
