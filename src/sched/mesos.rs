//! Mesos 风格调度器（两级 offer 协议的调度器侧）
//!
//! 不直接接触真实账本：分配器周期性送来 offer（一块私有的资源切片
//! 视图），调度器在切片内放置任务并把 claim 清单作为应答送回。一个
//! offer 内处理多个作业的 think time 累加后一次性计延迟，建模流水线
//! 时延。

use super::{Scheduler, SchedulerCore, requeue_or_abandon};
use crate::cell::{CellState, ClaimDelta, Job, RESOURCE_EPSILON, SchedulerId};
use crate::cluster::events::OfferResponse;
use crate::error::CoreError;
use crate::sim::Simulator;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// 分配器发给某个调度器的一份资源切片。
///
/// `cell` 是私有视图：切片之外的容量被标记为已占用，调度器据此放置。
/// 每个 offer 恰好被接收方消费一次，应答后终结。
#[derive(Debug)]
pub struct Offer {
    pub id: u64,
    pub scheduler: SchedulerId,
    pub cell: CellState,
}

/// 一次 offer 处理对外可见的结果：队列是否清空（清空则应撤销
/// 未决的 offer 请求）。
#[derive(Debug, Default)]
pub struct OfferFlow {
    pub queue_drained: bool,
}

pub struct MesosScheduler {
    core: SchedulerCore,
    offer_queue: VecDeque<Offer>,
}

impl MesosScheduler {
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
            offer_queue: VecDeque::new(),
        }
    }

    /// 分配器投递 offer 的入口。offer 逐个处理，与 monolithic 的忙标志
    /// 同样的非重入纪律。
    pub fn resource_offer(
        &mut self,
        offer: Offer,
        sim: &mut Simulator,
    ) -> Result<OfferFlow, CoreError> {
        self.offer_queue.push_back(offer);
        self.handle_next_offer(sim)
    }

    fn handle_next_offer(&mut self, sim: &mut Simulator) -> Result<OfferFlow, CoreError> {
        let mut flow = OfferFlow::default();

        while !self.core.scheduling {
            let Some(mut offer) = self.offer_queue.pop_front() else {
                break;
            };
            self.core.scheduling = true;
            debug!(
                scheduler = self.core.name(),
                offer = offer.id,
                "开始处理资源 offer"
            );

            let mut response: Vec<ClaimDelta> = Vec::new();
            let mut agg_think_secs = 0.0f64;

            while offer.cell.total_available_cpus() > RESOURCE_EPSILON
                && offer.cell.total_available_mem() > RESOURCE_EPSILON
                && self.core.has_pending()
            {
                let Some(mut job) = self.core.dequeue(sim.now()) else {
                    break;
                };
                let think = self.core.think_time(&job)?;
                agg_think_secs += think;
                job.num_scheduling_attempts += 1;
                job.num_task_scheduling_attempts += u64::from(job.unscheduled_tasks);

                if offer.cell.total_available_cpus() > job.cpus_per_task
                    && offer.cell.total_available_mem() > job.mem_per_task
                {
                    let claims = self.core.schedule_job(&job, &mut offer.cell)?;
                    if claims.is_empty() {
                        debug!(
                            scheduler = self.core.name(),
                            job = job.id,
                            offer = offer.id,
                            "offer 切片里无处安放，不计忙时"
                        );
                        self.core.metrics.num_no_resources_found_attempts += 1;
                    } else {
                        job.unscheduled_tasks -= claims.len() as u32;
                        debug!(
                            scheduler = self.core.name(),
                            job = job.id,
                            offer = offer.id,
                            placed = claims.len(),
                            remaining = job.unscheduled_tasks,
                            "接受 offer 的一部分"
                        );
                        self.core.metrics.num_successful_transactions += 1;
                        self.core.metrics.num_successful_task_transactions += claims.len() as u64;
                        let first_attempt = job.num_scheduling_attempts == 1;
                        self.core.record_useful_time(&mut job, think, first_attempt);
                        response.extend(claims);
                    }
                } else {
                    // 连一个任务都装不进 offer 的总剩余量，短路拒绝，不计忙时
                    debug!(
                        scheduler = self.core.name(),
                        job = job.id,
                        offer = offer.id,
                        cpus = job.cpus_per_task,
                        mem = job.mem_per_task,
                        "短路拒绝整个 offer"
                    );
                }

                requeue_or_abandon(&mut self.core, job, sim)?;
            }

            if !self.core.has_pending() {
                debug!(
                    scheduler = self.core.name(),
                    "队列已清空，撤销未决的 offer 请求"
                );
                flow.queue_drained = true;
            } else {
                debug!(
                    scheduler = self.core.name(),
                    depth = self.core.queue_depth(),
                    "队列里还有作业装不进这个 offer，继续等后续 offer"
                );
            }

            // think time 按整个 offer 批量计：应答延后 agg_think_secs 发出
            debug!(
                scheduler = self.core.name(),
                offer = offer.id,
                agg_think_secs,
                claims = response.len(),
                "挂起 offer 应答"
            );
            sim.after_delay(
                agg_think_secs,
                OfferResponse {
                    scheduler: self.core.id(),
                    offer_id: offer.id,
                    claims: response,
                },
            )?;

            self.core.scheduling = false;
        }

        Ok(flow)
    }
}

impl Scheduler for MesosScheduler {
    fn name(&self) -> &str {
        self.core.name()
    }
    fn core(&self) -> &SchedulerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn uses_offers(&self) -> bool {
        true
    }

    fn on_attach(&mut self, id: SchedulerId, _cell: &CellState) {
        self.core.attach(id);
    }

    /// 入队即可；向分配器登记 offer 请求由世界层完成。
    fn on_job_arrival(
        &mut self,
        job: Job,
        _cell: &mut CellState,
        sim: &mut Simulator,
    ) -> Result<(), CoreError> {
        self.core.enqueue(job, sim.now());
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
