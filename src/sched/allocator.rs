//! Mesos 风格分配器（两级 offer 协议的资源侧）
//!
//! 跟踪哪些调度器有未决的 offer 请求，按批次间隔轮转地为请求者计算
//! 公平切片（dominant-resource fairness 的等权均分），把切片在真实
//! 账本上悲观锁定（locked apply，不推进版本号），再把只暴露该切片的
//! 私有视图作为 offer 发出。收到应答后先解锁、再用 resource-fit 校验
//! 把接受的 claim 提交到真实账本。

use super::mesos::Offer;
use crate::cell::{
    CellState, ClaimDelta, CommitMode, CommitResult, ConflictMode, RESOURCE_EPSILON, SchedulerId,
};
use crate::cluster::events::{BuildOffer, schedule_end_events};
use crate::error::CoreError;
use crate::sim::Simulator;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

pub struct MesosAllocator {
    /// offer 批次间隔（秒）：请求与构建之间、相邻构建之间的间隔。
    offer_batch_interval: f64,
    cpu_weight: f64,
    mem_weight: f64,
    /// 预留给 CPU/内存之外维度的权重，当前模型只有两维。
    #[allow(dead_code)]
    other_weight: f64,

    registered: HashSet<SchedulerId>,
    rotation: VecDeque<SchedulerId>,
    /// 每个在途 offer 在真实账本上的锁定 claim，应答时解锁。
    offered_locks: HashMap<u64, Vec<ClaimDelta>>,
    next_offer_id: u64,
    build_scheduled: bool,
}

impl MesosAllocator {
    pub fn new(
        offer_batch_interval: f64,
        cpu_weight: f64,
        mem_weight: f64,
        other_weight: f64,
    ) -> Self {
        Self {
            offer_batch_interval,
            cpu_weight,
            mem_weight,
            other_weight,
            registered: HashSet::new(),
            rotation: VecDeque::new(),
            offered_locks: HashMap::new(),
            next_offer_id: 0,
            build_scheduled: false,
        }
    }

    /// 调度器登记 offer 请求。已登记的请求保持有效直到撤销，不重复入列。
    pub fn request_offer(
        &mut self,
        scheduler: SchedulerId,
        sim: &mut Simulator,
    ) -> Result<(), CoreError> {
        if !self.registered.insert(scheduler) {
            return Ok(());
        }
        self.rotation.push_back(scheduler);
        debug!(scheduler = scheduler.0, "登记 offer 请求");
        self.kick(sim)
    }

    /// 调度器队列清空后撤销请求；轮转队列里的旧条目在弹出时跳过。
    pub fn cancel_offer_request(&mut self, scheduler: SchedulerId) {
        if self.registered.remove(&scheduler) {
            debug!(scheduler = scheduler.0, "撤销 offer 请求");
        }
    }

    pub fn has_requests(&self) -> bool {
        !self.registered.is_empty()
    }

    fn kick(&mut self, sim: &mut Simulator) -> Result<(), CoreError> {
        if self.build_scheduled || self.registered.is_empty() {
            return Ok(());
        }
        self.build_scheduled = true;
        sim.after_delay(self.offer_batch_interval, BuildOffer)
    }

    /// 空闲池的加权主导份额，用于判断当前切片是否值得发出。
    fn dominant_free_share(&self, cell: &CellState) -> f64 {
        let cpu_share = if cell.total_cpus() > 0.0 {
            cell.total_available_cpus() / cell.total_cpus()
        } else {
            0.0
        };
        let mem_share = if cell.total_mem() > 0.0 {
            cell.total_available_mem() / cell.total_mem()
        } else {
            0.0
        };
        (cpu_share * self.cpu_weight).max(mem_share * self.mem_weight)
    }

    /// 为轮转队列中的下一个请求者构建 offer。
    ///
    /// 返回 `None` 表示这一轮没有可发的 offer（没有请求者，或空闲池的
    /// 公平切片小得不值一提——后者会安排下一轮再试）。
    pub fn build_next_offer(
        &mut self,
        cell: &mut CellState,
        sim: &mut Simulator,
    ) -> Result<Option<Offer>, CoreError> {
        self.build_scheduled = false;

        let scheduler = loop {
            match self.rotation.pop_front() {
                None => return Ok(None),
                Some(s) if self.registered.contains(&s) => break s,
                Some(_) => continue,
            }
        };

        let num_sharers = self.registered.len().max(1);
        let frac = 1.0 / num_sharers as f64;

        if self.dominant_free_share(cell) * frac <= RESOURCE_EPSILON {
            debug!(
                scheduler = scheduler.0,
                "空闲池的公平切片近乎为零，这一轮不发 offer"
            );
            self.rotation.push_back(scheduler);
            self.kick(sim)?;
            return Ok(None);
        }

        let id = self.next_offer_id;
        self.next_offer_id += 1;

        let mut private = CellState::new(
            cell.num_machines(),
            cell.cpus_per_machine(),
            cell.mem_per_machine(),
            ConflictMode::ResourceFit,
            CommitMode::Incremental,
        );
        let mut locks = Vec::new();

        for machine in 0..cell.num_machines() {
            let offered_cpus = cell.available_cpus(machine) * frac;
            let offered_mem = cell.available_mem(machine) * frac;

            // 私有视图：切片之外的容量一律标记为已占用
            let mask = ClaimDelta {
                scheduler,
                machine,
                seq_num: private.machine_seq_num(machine),
                duration: None,
                cpus: cell.cpus_per_machine() - offered_cpus,
                mem: cell.mem_per_machine() - offered_mem,
            };
            private.apply(&mask, true)?;

            if offered_cpus > RESOURCE_EPSILON || offered_mem > RESOURCE_EPSILON {
                let lock = ClaimDelta {
                    scheduler,
                    machine,
                    seq_num: cell.machine_seq_num(machine),
                    duration: None,
                    cpus: offered_cpus,
                    mem: offered_mem,
                };
                cell.apply(&lock, true)?;
                locks.push(lock);
            }
        }

        self.offered_locks.insert(id, locks);
        self.rotation.push_back(scheduler);
        self.kick(sim)?;

        info!(
            offer = id,
            scheduler = scheduler.0,
            share = frac,
            "发出资源 offer"
        );
        Ok(Some(Offer {
            id,
            scheduler,
            cell: private,
        }))
    }

    /// 处理调度器的 offer 应答：解锁切片，再把接受的 claim 用
    /// resource-fit 校验提交到真实账本（私有视图可能已经过期）。
    pub fn respond_to_offer(
        &mut self,
        offer_id: u64,
        claims: Vec<ClaimDelta>,
        cell: &mut CellState,
        sim: &mut Simulator,
    ) -> Result<CommitResult, CoreError> {
        if let Some(locks) = self.offered_locks.remove(&offer_id) {
            for lock in &locks {
                cell.unapply(lock);
            }
        }

        let result = cell.commit(claims);
        schedule_end_events(&result.committed, sim);
        debug!(
            offer = offer_id,
            committed = result.committed.len(),
            conflicted = result.conflicted.len(),
            "offer 应答已提交"
        );

        self.kick(sim)?;
        Ok(result)
    }
}
