//! 调度器
//!
//! 三种集群调度架构共享的基座：待调度队列、think time、随机首次适应
//! 放置算法与统计账目。三个变体在提交策略上分道扬镳：monolithic 直接
//! 写真实账本，mesos 只在 offer 的私有视图里放置，omega 先在影子状态
//! 放置再乐观提交。

use crate::cell::{CellState, ClaimDelta, Job, SchedulerId};
use crate::cluster::events::{JobArrival, SchedulingAttemptDone};
use crate::error::CoreError;
use crate::sim::Simulator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, trace};

// 子模块声明
mod allocator;
mod mesos;
mod metrics;
mod monolithic;
mod omega;

// 重新导出公共接口
pub use allocator::MesosAllocator;
pub use mesos::{MesosScheduler, Offer, OfferFlow};
pub use metrics::SchedulerMetrics;
pub use monolithic::MonolithicScheduler;
pub use omega::OmegaScheduler;

/// 部分调度的作业重新入队前的固定退避（秒）。
pub const RETRY_BACKOFF_SECS: f64 = 1.0;

/// 调度器接口：事件层通过它派发作业到达与 think time 到期。
pub trait Scheduler: Any {
    fn name(&self) -> &str;
    fn core(&self) -> &SchedulerCore;
    fn core_mut(&mut self) -> &mut SchedulerCore;

    fn queue_depth(&self) -> usize {
        self.core().queue_depth()
    }
    fn is_scheduling(&self) -> bool {
        self.core().scheduling
    }

    /// 该调度器是否经由分配器的 resource offer 获得资源。
    fn uses_offers(&self) -> bool {
        false
    }

    /// 注册到仿真世界时调用一次：分配编号，omega 在此同步影子状态。
    fn on_attach(&mut self, id: SchedulerId, cell: &CellState);

    fn on_job_arrival(
        &mut self,
        job: Job,
        cell: &mut CellState,
        sim: &mut Simulator,
    ) -> Result<(), CoreError>;

    /// think time 到期后的调度尝试。mesos 不走这条路径（它在 offer 处理
    /// 循环里批量计 think time），默认实现直接丢弃并告警。
    fn on_think_time_elapsed(
        &mut self,
        job: Job,
        think_secs: f64,
        cell: &mut CellState,
        sim: &mut Simulator,
    ) -> Result<(), CoreError> {
        let _ = (think_secs, cell, sim);
        tracing::warn!(
            scheduler = self.name(),
            job = job.id,
            "调度器未实现 think time 回调，丢弃作业"
        );
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 所有调度器变体共享的状态与行为。
pub struct SchedulerCore {
    name: String,
    id: SchedulerId,
    constant_think_times: HashMap<String, f64>,
    per_task_think_times: HashMap<String, f64>,
    num_machines_to_blacklist: usize,
    pending: VecDeque<Job>,
    pub(crate) scheduling: bool,
    rng: StdRng,
    pub metrics: SchedulerMetrics,
}

impl SchedulerCore {
    pub fn new(
        name: impl Into<String>,
        constant_think_times: HashMap<String, f64>,
        per_task_think_times: HashMap<String, f64>,
        num_machines_to_blacklist: usize,
        seed: u64,
    ) -> Self {
        Self {
            name: name.into(),
            id: SchedulerId(0),
            constant_think_times,
            per_task_think_times,
            num_machines_to_blacklist,
            pending: VecDeque::new(),
            scheduling: false,
            rng: StdRng::seed_from_u64(seed),
            metrics: SchedulerMetrics::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn id(&self) -> SchedulerId {
        self.id
    }
    pub(crate) fn attach(&mut self, id: SchedulerId) {
        self.id = id;
    }

    pub fn queue_depth(&self) -> usize {
        self.pending.len()
    }
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn enqueue(&mut self, mut job: Job, now: crate::sim::SimTime) {
        job.last_enqueued = now;
        trace!(scheduler = %self.name, job = job.id, "作业入队");
        self.pending.push_back(job);
    }

    /// 取出队首作业并累计其排队等待时间。
    pub fn dequeue(&mut self, now: crate::sim::SimTime) -> Option<Job> {
        let mut job = self.pending.pop_front()?;
        job.update_time_in_queue_stats(now);
        Some(job)
    }

    /// think time = 常数项 + 每任务项 × 未调度任务数。
    /// 对应工作负载缺少任一配置项都是配置错误。
    pub fn think_time(&self, job: &Job) -> Result<f64, CoreError> {
        let constant = self
            .constant_think_times
            .get(&job.workload_name)
            .ok_or_else(|| CoreError::MissingThinkTime(job.workload_name.clone()))?;
        let per_task = self
            .per_task_think_times
            .get(&job.workload_name)
            .ok_or_else(|| CoreError::MissingThinkTime(job.workload_name.clone()))?;
        Ok(constant + per_task * f64::from(job.unscheduled_tasks))
    }

    pub fn has_think_time(&self, workload: &str) -> bool {
        self.constant_think_times.contains_key(workload)
            && self.per_task_think_times.contains_key(workload)
    }

    /// 随机首次适应放置：从候选机器池中均匀抽取，放得下就建 claim 并
    /// 立即记到目标账本上，放不下就把该候选换到池尾并缩小可用范围。
    /// 任务需求超过单机裸容量时立即报错（该作业永远无法调度）。
    pub fn schedule_job(
        &mut self,
        job: &Job,
        cell: &mut CellState,
    ) -> Result<Vec<ClaimDelta>, CoreError> {
        if job.cpus_per_task > cell.cpus_per_machine() || job.mem_per_task > cell.mem_per_machine()
        {
            return Err(CoreError::TaskLargerThanMachine {
                job: job.id,
                cpus: job.cpus_per_task,
                mem: job.mem_per_task,
                machine_cpus: cell.cpus_per_machine(),
                machine_mem: cell.mem_per_machine(),
            });
        }

        let mut claims = Vec::new();
        let mut candidate_pool: Vec<usize> = (0..cell.num_machines()).collect();
        let mut remaining_tasks = job.unscheduled_tasks;
        let mut remaining_candidates = cell
            .num_machines()
            .saturating_sub(self.num_machines_to_blacklist);

        while remaining_tasks > 0 && remaining_candidates > 0 {
            let candidate_index = self.rng.random_range(0..remaining_candidates);
            let machine = candidate_pool[candidate_index];

            if cell.available_cpus(machine) >= job.cpus_per_task
                && cell.available_mem(machine) >= job.mem_per_task
            {
                let claim = ClaimDelta {
                    scheduler: self.id,
                    machine,
                    seq_num: cell.machine_seq_num(machine),
                    duration: Some(job.task_duration),
                    cpus: job.cpus_per_task,
                    mem: job.mem_per_task,
                };
                cell.apply(&claim, false)?;
                claims.push(claim);
                remaining_tasks -= 1;
            } else {
                self.metrics.failed_find_victim_attempts += 1;
                candidate_pool.swap(candidate_index, remaining_candidates - 1);
                remaining_candidates -= 1;
            }
        }

        Ok(claims)
    }

    pub(crate) fn record_useful_time(&mut self, job: &mut Job, secs: f64, first_attempt: bool) {
        self.metrics.total_useful_time_scheduling += secs;
        if first_attempt {
            self.metrics.first_attempt_useful_time_scheduling += secs;
        }
        job.useful_time_scheduling += secs;
        *self
            .metrics
            .per_workload_useful_time
            .entry(job.workload_name.clone())
            .or_insert(0.0) += secs;
    }

    pub(crate) fn record_wasted_time(&mut self, job: &mut Job, secs: f64, first_attempt: bool) {
        self.metrics.total_wasted_time_scheduling += secs;
        if first_attempt {
            self.metrics.first_attempt_wasted_time_scheduling += secs;
        }
        job.wasted_time_scheduling += secs;
        *self
            .metrics
            .per_workload_wasted_time
            .entry(job.workload_name.clone())
            .or_insert(0.0) += secs;
    }
}

/// 空闲时取队首作业，挂起 think time 后的调度尝试事件。
/// monolithic 与 omega 共用；mesos 由 offer 处理循环驱动，不走这里。
pub(crate) fn start_next_job(core: &mut SchedulerCore, sim: &mut Simulator) -> Result<(), CoreError> {
    if core.scheduling {
        return Ok(());
    }
    let Some(mut job) = core.dequeue(sim.now()) else {
        return Ok(());
    };
    core.scheduling = true;
    job.last_scheduling_start = sim.now();
    let think = core.think_time(&job)?;
    trace!(scheduler = %core.name, job = job.id, think, "开始调度作业");
    sim.after_delay(
        think,
        SchedulingAttemptDone {
            scheduler: core.id,
            job,
            think_secs: think,
        },
    )
}

/// 共享的重试/放弃策略：100 次尝试仍颗粒无收、或累计 1000 次尝试后
/// 放弃；否则退避一个时间单位后重新入队。
pub(crate) fn requeue_or_abandon(
    core: &mut SchedulerCore,
    job: Job,
    sim: &mut Simulator,
) -> Result<(), CoreError> {
    if job.unscheduled_tasks == 0 {
        debug!(scheduler = %core.name, job = job.id, "作业全部任务已调度");
        return Ok(());
    }

    let zero_progress = job.unscheduled_tasks == job.num_tasks;
    if (job.num_scheduling_attempts > 100 && zero_progress) || job.num_scheduling_attempts > 1000 {
        info!(
            scheduler = %core.name,
            job = job.id,
            attempts = job.num_scheduling_attempts,
            remaining = job.unscheduled_tasks,
            total = job.num_tasks,
            "放弃作业"
        );
        core.metrics.num_jobs_timed_out += 1;
        return Ok(());
    }

    debug!(
        scheduler = %core.name,
        job = job.id,
        remaining = job.unscheduled_tasks,
        "作业未调度完，退避后重新入队"
    );
    sim.after_delay(
        RETRY_BACKOFF_SECS,
        JobArrival {
            scheduler: core.id,
            job,
        },
    )
}
