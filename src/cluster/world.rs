//! 集群仿真世界
//!
//! 拥有共享资源账本、全部调度器与可选的分配器。事件处理函数在这里
//! 拆分字段借用并编排各组件；配置类致命错误记入 `fatal` 并让引擎停机，
//! 软失败（放置失败、提交冲突、作业放弃）只进统计。

use crate::cell::{CellState, ClaimDelta, Job, SchedulerId};
use crate::error::CoreError;
use crate::sched::{MesosAllocator, MesosScheduler, Scheduler};
use crate::sim::{Simulator, World};
use std::any::Any;
use tracing::{error, trace, warn};

pub struct ClusterWorld {
    pub cell: CellState,
    pub schedulers: Vec<Box<dyn Scheduler>>,
    pub allocator: Option<MesosAllocator>,
    fatal: Option<CoreError>,
}

impl World for ClusterWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn halted(&self) -> bool {
        self.fatal.is_some()
    }
}

impl ClusterWorld {
    pub(crate) fn new(
        cell: CellState,
        schedulers: Vec<Box<dyn Scheduler>>,
        allocator: Option<MesosAllocator>,
    ) -> Self {
        Self {
            cell,
            schedulers,
            allocator,
            fatal: None,
        }
    }

    fn fail(&mut self, err: CoreError) {
        error!(%err, "仿真遇到致命错误，停机");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }

    pub(crate) fn take_fatal(&mut self) -> Option<CoreError> {
        self.fatal.take()
    }

    pub(crate) fn job_arrival(&mut self, scheduler: SchedulerId, job: Job, sim: &mut Simulator) {
        if let Err(err) = self.try_job_arrival(scheduler, job, sim) {
            self.fail(err);
        }
    }

    fn try_job_arrival(
        &mut self,
        scheduler: SchedulerId,
        job: Job,
        sim: &mut Simulator,
    ) -> Result<(), CoreError> {
        let sched = &mut self.schedulers[scheduler.0];
        sched.on_job_arrival(job, &mut self.cell, sim)?;
        if sched.uses_offers() {
            let Some(alloc) = self.allocator.as_mut() else {
                return Err(CoreError::NoAllocator);
            };
            alloc.request_offer(scheduler, sim)?;
        }
        Ok(())
    }

    pub(crate) fn scheduling_attempt_done(
        &mut self,
        scheduler: SchedulerId,
        job: Job,
        think_secs: f64,
        sim: &mut Simulator,
    ) {
        let result = self.schedulers[scheduler.0].on_think_time_elapsed(
            job,
            think_secs,
            &mut self.cell,
            sim,
        );
        if let Err(err) = result {
            self.fail(err);
        }
    }

    pub(crate) fn claim_expired(&mut self, claim: ClaimDelta) {
        trace!(machine = claim.machine, cpus = claim.cpus, mem = claim.mem, "任务到期，释放资源");
        self.cell.unapply(&claim);
    }

    pub(crate) fn build_offer(&mut self, sim: &mut Simulator) {
        if let Err(err) = self.try_build_offer(sim) {
            self.fail(err);
        }
    }

    fn try_build_offer(&mut self, sim: &mut Simulator) -> Result<(), CoreError> {
        let Some(alloc) = self.allocator.as_mut() else {
            return Err(CoreError::NoAllocator);
        };
        let Some(offer) = alloc.build_next_offer(&mut self.cell, sim)? else {
            return Ok(());
        };

        let target = offer.scheduler;
        let Some(mesos) = self.schedulers[target.0]
            .as_any_mut()
            .downcast_mut::<MesosScheduler>()
        else {
            return Err(CoreError::UnexpectedOffer(
                self.schedulers[target.0].name().to_string(),
            ));
        };

        let flow = mesos.resource_offer(offer, sim)?;
        if flow.queue_drained {
            alloc.cancel_offer_request(target);
        }
        Ok(())
    }

    pub(crate) fn offer_response(
        &mut self,
        scheduler: SchedulerId,
        offer_id: u64,
        claims: Vec<ClaimDelta>,
        sim: &mut Simulator,
    ) {
        if let Err(err) = self.try_offer_response(scheduler, offer_id, claims, sim) {
            self.fail(err);
        }
    }

    fn try_offer_response(
        &mut self,
        scheduler: SchedulerId,
        offer_id: u64,
        claims: Vec<ClaimDelta>,
        sim: &mut Simulator,
    ) -> Result<(), CoreError> {
        let Some(alloc) = self.allocator.as_mut() else {
            return Err(CoreError::NoAllocator);
        };
        let result = alloc.respond_to_offer(offer_id, claims, &mut self.cell, sim)?;
        if !result.conflicted.is_empty() {
            warn!(
                offer = offer_id,
                conflicted = result.conflicted.len(),
                "offer 应答中有 claim 已过期，被丢弃"
            );
            self.schedulers[scheduler.0]
                .core_mut()
                .metrics
                .num_failed_task_transactions += result.conflicted.len() as u64;
        }
        Ok(())
    }
}
