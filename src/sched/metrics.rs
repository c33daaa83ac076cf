//! 调度统计
//!
//! 每个调度器的事务/任务计数与忙时账目，运行结束后只读。

use std::collections::HashMap;

/// 调度器统计信息
#[derive(Debug, Default, Clone)]
pub struct SchedulerMetrics {
    pub num_successful_transactions: u64,
    pub num_failed_transactions: u64,
    pub num_retried_transactions: u64,
    pub num_jobs_timed_out: u64,
    pub num_successful_task_transactions: u64,
    pub num_failed_task_transactions: u64,
    pub num_no_resources_found_attempts: u64,
    pub failed_find_victim_attempts: u64,

    pub total_useful_time_scheduling: f64,
    pub total_wasted_time_scheduling: f64,
    pub first_attempt_useful_time_scheduling: f64,
    pub first_attempt_wasted_time_scheduling: f64,

    pub per_workload_useful_time: HashMap<String, f64>,
    pub per_workload_wasted_time: HashMap<String, f64>,
}
