//! 作业
//!
//! 一个作业由若干同构任务组成。作业在任意时刻只被一个调度器持有，
//! 调度进度字段只由持有它的调度器推进。

use crate::sim::SimTime;

/// A bag of identical tasks submitted at one point in simulated time.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub submitted: SimTime,
    pub num_tasks: u32,
    pub task_duration: SimTime,
    pub workload_name: String,
    pub cpus_per_task: f64,
    pub mem_per_task: f64,

    // scheduling progress
    pub unscheduled_tasks: u32,
    pub num_scheduling_attempts: u64,
    pub num_task_scheduling_attempts: u64,
    pub useful_time_scheduling: f64,
    pub wasted_time_scheduling: f64,

    // queue-wait bookkeeping
    pub last_enqueued: SimTime,
    pub last_scheduling_start: SimTime,
    pub first_scheduled: bool,
    pub time_in_queue_till_first_scheduled: SimTime,
    pub time_in_queue_till_fully_scheduled: SimTime,
}

impl Job {
    pub fn new(
        id: u64,
        submitted: SimTime,
        num_tasks: u32,
        task_duration: SimTime,
        workload_name: impl Into<String>,
        cpus_per_task: f64,
        mem_per_task: f64,
    ) -> Self {
        Self {
            id,
            submitted,
            num_tasks,
            task_duration,
            workload_name: workload_name.into(),
            cpus_per_task,
            mem_per_task,
            unscheduled_tasks: num_tasks,
            num_scheduling_attempts: 0,
            num_task_scheduling_attempts: 0,
            useful_time_scheduling: 0.0,
            wasted_time_scheduling: 0.0,
            last_enqueued: SimTime::ZERO,
            last_scheduling_start: SimTime::ZERO,
            first_scheduled: false,
            time_in_queue_till_first_scheduled: SimTime::ZERO,
            time_in_queue_till_fully_scheduled: SimTime::ZERO,
        }
    }

    pub fn is_fully_scheduled(&self) -> bool {
        self.unscheduled_tasks == 0
    }

    /// 出队时累计排队等待时间。
    pub fn update_time_in_queue_stats(&mut self, now: SimTime) {
        let waited = SimTime(now.0.saturating_sub(self.last_enqueued.0));
        self.time_in_queue_till_fully_scheduled =
            self.time_in_queue_till_fully_scheduled.saturating_add(waited);
        if !self.first_scheduled {
            self.time_in_queue_till_first_scheduled =
                self.time_in_queue_till_first_scheduled.saturating_add(waited);
            self.first_scheduled = true;
        }
    }
}
