//! 集群事件
//!
//! 引擎事件到仿真世界的桥接：作业到达、think time 到期、任务到期释放、
//! offer 的构建与应答。事件只携带数据与编号，真正的编排在
//! `ClusterWorld` 的处理函数里完成。

use super::world::ClusterWorld;
use crate::cell::{ClaimDelta, Job, SchedulerId};
use crate::sim::{Event, Simulator, World};

fn cluster_world(world: &mut dyn World) -> &mut ClusterWorld {
    world
        .as_any_mut()
        .downcast_mut::<ClusterWorld>()
        .expect("world must be ClusterWorld")
}

/// 作业到达（首次提交或退避后的重新入队）。
pub struct JobArrival {
    pub scheduler: SchedulerId,
    pub job: Job,
}

impl Event for JobArrival {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let JobArrival { scheduler, job } = *self;
        cluster_world(world).job_arrival(scheduler, job, sim);
    }
}

/// think time 到期，调度决策生效。
pub struct SchedulingAttemptDone {
    pub scheduler: SchedulerId,
    pub job: Job,
    pub think_secs: f64,
}

impl Event for SchedulingAttemptDone {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let SchedulingAttemptDone {
            scheduler,
            job,
            think_secs,
        } = *self;
        cluster_world(world).scheduling_attempt_done(scheduler, job, think_secs, sim);
    }
}

/// 任务运行时长耗尽，释放其占用的资源。
pub struct ClaimExpired {
    pub claim: ClaimDelta,
}

impl Event for ClaimExpired {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) {
        let ClaimExpired { claim } = *self;
        cluster_world(world).claim_expired(claim);
    }
}

/// 分配器的下一轮 offer 构建。
pub struct BuildOffer;

impl Event for BuildOffer {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        cluster_world(world).build_offer(sim);
    }
}

/// 调度器对 offer 的应答（已延迟了批量 think time）。
pub struct OfferResponse {
    pub scheduler: SchedulerId,
    pub offer_id: u64,
    pub claims: Vec<ClaimDelta>,
}

impl Event for OfferResponse {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let OfferResponse {
            scheduler,
            offer_id,
            claims,
        } = *self;
        cluster_world(world).offer_response(scheduler, offer_id, claims, sim);
    }
}

/// 为每个带时长的 claim 挂起到期释放事件；锁定类 claim（无时长）没有
/// 到期一说。
pub fn schedule_end_events(claims: &[ClaimDelta], sim: &mut Simulator) {
    for claim in claims {
        let Some(duration) = claim.duration else {
            continue;
        };
        sim.schedule(
            sim.now().saturating_add(duration),
            ClaimExpired {
                claim: claim.clone(),
            },
        );
    }
}
