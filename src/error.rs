//! 错误类型
//!
//! 区分两类会向调用方传播的硬错误：配置错误（仿真搭建阶段的 bug）与
//! 容量不可能错误（任务需求超过单机裸容量，永远无法调度）。
//! 放置失败、乐观提交冲突、作业放弃都不是错误，只计入统计。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("negative delay passed to after_delay: {0}")]
    NegativeDelay(f64),

    #[error("no think time defined for workload: {0}")]
    MissingThinkTime(String),

    #[error(
        "job {job} requires {cpus} cpus and {mem} mem per task, \
         but machines only have {machine_cpus} cpus and {machine_mem} mem"
    )]
    TaskLargerThanMachine {
        job: u64,
        cpus: f64,
        mem: f64,
        machine_cpus: f64,
        machine_mem: f64,
    },

    #[error(
        "claim of {cpus} cpus / {mem} mem does not fit machine {machine} \
         ({occupied_cpus:.3}/{capacity_cpus:.3} cpus, {occupied_mem:.3}/{capacity_mem:.3} mem occupied)"
    )]
    CapacityViolation {
        machine: usize,
        cpus: f64,
        mem: f64,
        occupied_cpus: f64,
        capacity_cpus: f64,
        occupied_mem: f64,
        capacity_mem: f64,
    },

    #[error("unknown conflict mode: {0}")]
    UnknownConflictMode(String),

    #[error("unknown commit mode: {0}")]
    UnknownCommitMode(String),

    #[error("at least one scheduler must be registered")]
    NoSchedulers,

    #[error("duplicate scheduler name: {0}")]
    DuplicateScheduler(String),

    #[error("no workload to scheduler mapping configured")]
    EmptyWorkloadMap,

    #[error("workload {workload} is mapped to unregistered scheduler {scheduler}")]
    UnknownScheduler { workload: String, scheduler: String },

    #[error("simulated time must be 0 when the run starts, got {0}")]
    NonZeroStartTime(f64),

    #[error("scheduler {0} already has queued jobs before the run")]
    DirtySchedulerQueue(String),

    #[error("offer delivered to scheduler {0}, which does not take offers")]
    UnexpectedOffer(String),

    #[error("offer machinery invoked but no allocator is configured")]
    NoAllocator,
}
