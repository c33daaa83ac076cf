//! 集群仿真驱动
//!
//! 把账本、调度器、分配器与工作负载接到事件引擎上：构造时做全部配置
//! 校验（fail fast），预填充初始作业，按提交时间挂起到达事件；运行时
//! 检查前置条件并把世界层的致命错误转成 `Err` 交还调用方。

use super::events::{JobArrival, schedule_end_events};
use super::world::ClusterWorld;
use crate::cell::{CellState, RESOURCE_EPSILON, SchedulerId, Workload};
use crate::error::CoreError;
use crate::sched::{MesosAllocator, Scheduler, SchedulerCore, SchedulerMetrics};
use crate::sim::{SimTime, Simulator};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// 预填充放置使用的固定随机种子，与调度器种子无关。
const PREFILL_SEED: u64 = 0xCE11;

pub struct ClusterSimulator {
    sim: Simulator,
    world: ClusterWorld,
    num_jobs_loaded: usize,
    num_jobs_skipped: usize,
}

impl ClusterSimulator {
    pub fn new(
        cell: CellState,
        schedulers: Vec<Box<dyn Scheduler>>,
        workload_to_scheduler_map: HashMap<String, Vec<String>>,
        workloads: Vec<Workload>,
        prefill_workloads: Vec<Workload>,
        allocator: Option<MesosAllocator>,
    ) -> Result<Self, CoreError> {
        if schedulers.is_empty() {
            return Err(CoreError::NoSchedulers);
        }
        if workload_to_scheduler_map.is_empty() {
            return Err(CoreError::EmptyWorkloadMap);
        }

        let mut name_to_index: HashMap<String, usize> = HashMap::new();
        for (idx, sched) in schedulers.iter().enumerate() {
            if name_to_index
                .insert(sched.name().to_string(), idx)
                .is_some()
            {
                return Err(CoreError::DuplicateScheduler(sched.name().to_string()));
            }
        }

        // 映射指向的调度器必须已注册，且对该工作负载配置了 think time
        for (workload, mapped) in &workload_to_scheduler_map {
            for name in mapped {
                let Some(&idx) = name_to_index.get(name) else {
                    return Err(CoreError::UnknownScheduler {
                        workload: workload.clone(),
                        scheduler: name.clone(),
                    });
                };
                if !schedulers[idx].core().has_think_time(workload) {
                    return Err(CoreError::MissingThinkTime(workload.clone()));
                }
            }
        }

        let mut sim = Simulator::default();
        let mut world = ClusterWorld::new(cell, schedulers, allocator);

        // 预填充先于注册：omega 的影子状态在 attach 时同步，必须看到
        // 预填充之后的账本
        prefill(&mut world.cell, &prefill_workloads, &mut sim)?;

        for (idx, sched) in world.schedulers.iter_mut().enumerate() {
            sched.on_attach(SchedulerId(idx), &world.cell);
        }

        // 到达事件。作业从工作负载里克隆出来：每个投递出去的 Job 都是
        // 接收调度器的私有实例，多个 omega 调度器竞争同一工作负载时
        // 由轮转路由切分作业流。
        let mut round_robin = 0usize;
        let mut num_loaded = 0usize;
        let mut num_skipped = 0usize;
        for workload in &workloads {
            let mut loaded = 0usize;
            let mut skipped = 0usize;
            for job in workload.jobs() {
                let mapped = workload_to_scheduler_map
                    .get(&job.workload_name)
                    .filter(|names| !names.is_empty());
                let Some(mapped) = mapped else {
                    warn!(
                        job = job.id,
                        workload = %job.workload_name,
                        "作业所属的工作负载没有映射到任何调度器，跳过"
                    );
                    skipped += 1;
                    continue;
                };

                if job.cpus_per_task > world.cell.cpus_per_machine()
                    || job.mem_per_task > world.cell.mem_per_machine()
                {
                    return Err(CoreError::TaskLargerThanMachine {
                        job: job.id,
                        cpus: job.cpus_per_task,
                        mem: job.mem_per_task,
                        machine_cpus: world.cell.cpus_per_machine(),
                        machine_mem: world.cell.mem_per_machine(),
                    });
                }
                if job.cpus_per_task * f64::from(job.num_tasks)
                    > world.cell.total_cpus() + RESOURCE_EPSILON
                    || job.mem_per_task * f64::from(job.num_tasks)
                        > world.cell.total_mem() + RESOURCE_EPSILON
                {
                    warn!(
                        job = job.id,
                        "整个集群也装不下该作业的全部任务，它不可能一次性全部调度"
                    );
                }

                let name = &mapped[round_robin % mapped.len()];
                if mapped.len() > 1 {
                    round_robin += 1;
                }
                let idx = name_to_index[name];
                sim.schedule(
                    job.submitted,
                    JobArrival {
                        scheduler: SchedulerId(idx),
                        job: job.clone(),
                    },
                );
                loaded += 1;
            }
            info!(
                workload = workload.name(),
                loaded, skipped, "工作负载装载完成"
            );
            num_loaded += loaded;
            num_skipped += skipped;
        }

        Ok(Self {
            sim,
            world,
            num_jobs_loaded: num_loaded,
            num_jobs_skipped: num_skipped,
        })
    }

    /// 运行仿真直到事件耗尽，或越过仿真时长上限/墙钟预算。
    /// 仅当墙钟预算耗尽时返回 `Ok(false)`；作业调度不完不会阻止返回，
    /// 它们按策略被放弃。
    pub fn run(
        &mut self,
        run_time_limit: Option<f64>,
        wall_clock_timeout: Option<f64>,
    ) -> Result<bool, CoreError> {
        if self.sim.now() != SimTime::ZERO {
            return Err(CoreError::NonZeroStartTime(self.sim.now().as_secs_f64()));
        }
        for sched in &self.world.schedulers {
            if sched.queue_depth() > 0 {
                return Err(CoreError::DirtySchedulerQueue(sched.name().to_string()));
            }
        }

        let limit = match run_time_limit {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Some(SimTime::from_secs_f64(secs)),
            Some(secs) => return Err(CoreError::NegativeDelay(secs)),
            None => None,
        };
        let budget = match wall_clock_timeout {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => return Err(CoreError::NegativeDelay(secs)),
            None => None,
        };

        let completed = self.sim.run_bounded(limit, budget, &mut self.world);
        if let Some(err) = self.world.take_fatal() {
            return Err(err);
        }
        Ok(completed)
    }

    pub fn now(&self) -> SimTime {
        self.sim.now()
    }

    pub fn cell(&self) -> &CellState {
        &self.world.cell
    }

    pub fn scheduler_metrics(&self, name: &str) -> Option<&SchedulerMetrics> {
        self.world
            .schedulers
            .iter()
            .find(|s| s.name() == name)
            .map(|s| &s.core().metrics)
    }

    pub fn scheduler_names(&self) -> Vec<String> {
        self.world
            .schedulers
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn num_jobs_loaded(&self) -> usize {
        self.num_jobs_loaded
    }

    pub fn num_jobs_skipped(&self) -> usize {
        self.num_jobs_skipped
    }
}

/// 预填充：仿真开始前直接把初始作业放上账本并挂起到期事件。
/// 单任务需求超过单机容量的预填充作业忽略并告警。
fn prefill(
    cell: &mut CellState,
    prefill_workloads: &[Workload],
    sim: &mut Simulator,
) -> Result<(), CoreError> {
    if prefill_workloads.is_empty() {
        return Ok(());
    }

    let mut prefill_core = SchedulerCore::new(
        "prefill",
        HashMap::new(),
        HashMap::new(),
        0,
        PREFILL_SEED,
    );

    for workload in prefill_workloads {
        info!(
            workload = workload.name(),
            jobs = workload.num_jobs(),
            "预填充账本"
        );
        for job in workload.jobs() {
            if job.cpus_per_task > cell.cpus_per_machine()
                || job.mem_per_task > cell.mem_per_machine()
            {
                warn!(
                    job = job.id,
                    cpus = job.cpus_per_task,
                    mem = job.mem_per_task,
                    "预填充作业单任务需求超过单机容量，忽略"
                );
                continue;
            }
            let claims = prefill_core.schedule_job(job, cell)?;
            schedule_end_events(&claims, sim);
        }
    }

    info!(
        occupied_cpus = cell.total_occupied_cpus(),
        occupied_mem = cell.total_occupied_mem(),
        cpus_pct = cell.total_occupied_cpus() / cell.total_cpus() * 100.0,
        mem_pct = cell.total_occupied_mem() / cell.total_mem() * 100.0,
        "预填充完成"
    );
    Ok(())
}
