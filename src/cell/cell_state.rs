//! 集群资源账本（cell state）
//!
//! 维护每台机器的 CPU/内存容量、当前占用与版本号，并以 claim 为单位
//! 提供事务化的申请/释放与批量提交。两种冲突检测模式服务于不同的
//! 并发控制策略：乐观调度器比对版本号，offer 式调度器复查资源是否仍然
//! 放得下。两种提交模式决定一批 claim 是独立生效还是整批成败。

use super::claim::ClaimDelta;
use crate::error::CoreError;
use tracing::{debug, trace, warn};

/// 浮点资源比较的容差。
pub const RESOURCE_EPSILON: f64 = 1e-6;

/// 提交时如何判定一个 claim 是否仍然有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictMode {
    /// 机器当前版本号必须等于 claim 创建时记录的版本号。
    SequenceNumbers,
    /// 忽略版本历史，只要机器当前仍放得下该 claim 即有效。
    ResourceFit,
}

impl ConflictMode {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw.trim() {
            "sequence-numbers" => Ok(Self::SequenceNumbers),
            "resource-fit" => Ok(Self::ResourceFit),
            other => Err(CoreError::UnknownConflictMode(other.to_string())),
        }
    }
}

/// 一批 claim 如何生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// 逐个提交：无效的丢弃，有效的生效，作业可能被部分调度。
    Incremental,
    /// 整批成败：任一 claim 无效则全部回滚。
    AllOrNothing,
}

impl CommitMode {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw.trim() {
            "incremental" => Ok(Self::Incremental),
            "all-or-nothing" => Ok(Self::AllOrNothing),
            other => Err(CoreError::UnknownCommitMode(other.to_string())),
        }
    }
}

/// 一次批量提交的结果。
#[derive(Debug, Default)]
pub struct CommitResult {
    pub committed: Vec<ClaimDelta>,
    pub conflicted: Vec<ClaimDelta>,
}

/// 整个仿真集群的资源账本。
///
/// 克隆得到的副本是完全独立的深拷贝，用作 Omega 调度器的影子状态或
/// offer 的私有视图，绝不与真实账本共享可变状态。
#[derive(Debug, Clone)]
pub struct CellState {
    num_machines: usize,
    cpus_per_machine: f64,
    mem_per_machine: f64,
    conflict_mode: ConflictMode,
    commit_mode: CommitMode,

    occupied_cpus: Vec<f64>,
    occupied_mem: Vec<f64>,
    machine_seq_nums: Vec<u64>,

    total_occupied_cpus: f64,
    total_occupied_mem: f64,
}

impl CellState {
    pub fn new(
        num_machines: usize,
        cpus_per_machine: f64,
        mem_per_machine: f64,
        conflict_mode: ConflictMode,
        commit_mode: CommitMode,
    ) -> Self {
        Self {
            num_machines,
            cpus_per_machine,
            mem_per_machine,
            conflict_mode,
            commit_mode,
            occupied_cpus: vec![0.0; num_machines],
            occupied_mem: vec![0.0; num_machines],
            machine_seq_nums: vec![0; num_machines],
            total_occupied_cpus: 0.0,
            total_occupied_mem: 0.0,
        }
    }

    pub fn num_machines(&self) -> usize {
        self.num_machines
    }
    pub fn cpus_per_machine(&self) -> f64 {
        self.cpus_per_machine
    }
    pub fn mem_per_machine(&self) -> f64 {
        self.mem_per_machine
    }
    pub fn conflict_mode(&self) -> ConflictMode {
        self.conflict_mode
    }
    pub fn commit_mode(&self) -> CommitMode {
        self.commit_mode
    }

    pub fn total_cpus(&self) -> f64 {
        self.cpus_per_machine * self.num_machines as f64
    }
    pub fn total_mem(&self) -> f64 {
        self.mem_per_machine * self.num_machines as f64
    }
    pub fn total_occupied_cpus(&self) -> f64 {
        self.total_occupied_cpus
    }
    pub fn total_occupied_mem(&self) -> f64 {
        self.total_occupied_mem
    }
    pub fn total_available_cpus(&self) -> f64 {
        (self.total_cpus() - self.total_occupied_cpus).max(0.0)
    }
    pub fn total_available_mem(&self) -> f64 {
        (self.total_mem() - self.total_occupied_mem).max(0.0)
    }

    /// 机器当前可用 CPU，不为负。
    pub fn available_cpus(&self, machine: usize) -> f64 {
        (self.cpus_per_machine - self.occupied_cpus[machine]).max(0.0)
    }

    /// 机器当前可用内存，不为负。
    pub fn available_mem(&self, machine: usize) -> f64 {
        (self.mem_per_machine - self.occupied_mem[machine]).max(0.0)
    }

    /// 机器版本号：每次非锁定的 apply 递增一次。
    pub fn machine_seq_num(&self, machine: usize) -> u64 {
        self.machine_seq_nums[machine]
    }

    /// 把 claim 记到账本上：占用增加；`locked` 为 false 时版本号 +1。
    /// 超出机器容量则返回容量违约错误，账本不变。
    pub fn apply(&mut self, claim: &ClaimDelta, locked: bool) -> Result<(), CoreError> {
        let m = claim.machine;
        let new_cpus = self.occupied_cpus[m] + claim.cpus;
        let new_mem = self.occupied_mem[m] + claim.mem;
        if new_cpus > self.cpus_per_machine + RESOURCE_EPSILON
            || new_mem > self.mem_per_machine + RESOURCE_EPSILON
        {
            return Err(CoreError::CapacityViolation {
                machine: m,
                cpus: claim.cpus,
                mem: claim.mem,
                occupied_cpus: self.occupied_cpus[m],
                capacity_cpus: self.cpus_per_machine,
                occupied_mem: self.occupied_mem[m],
                capacity_mem: self.mem_per_machine,
            });
        }

        self.occupied_cpus[m] = new_cpus;
        self.occupied_mem[m] = new_mem;
        self.total_occupied_cpus += claim.cpus;
        self.total_occupied_mem += claim.mem;
        if !locked {
            self.machine_seq_nums[m] = self.machine_seq_nums[m].saturating_add(1);
        }
        trace!(
            machine = m,
            cpus = claim.cpus,
            mem = claim.mem,
            locked,
            seq = self.machine_seq_nums[m],
            "记账"
        );
        Ok(())
    }

    /// apply 的逆操作：释放 claim 占用的资源（回滚或任务到期）。
    pub fn unapply(&mut self, claim: &ClaimDelta) {
        let m = claim.machine;
        if self.occupied_cpus[m] + RESOURCE_EPSILON < claim.cpus
            || self.occupied_mem[m] + RESOURCE_EPSILON < claim.mem
        {
            warn!(
                machine = m,
                occupied_cpus = self.occupied_cpus[m],
                claim_cpus = claim.cpus,
                "释放量超过占用量，按占用量截断"
            );
        }
        let freed_cpus = claim.cpus.min(self.occupied_cpus[m]);
        let freed_mem = claim.mem.min(self.occupied_mem[m]);
        self.occupied_cpus[m] -= freed_cpus;
        self.occupied_mem[m] -= freed_mem;
        self.total_occupied_cpus = (self.total_occupied_cpus - freed_cpus).max(0.0);
        self.total_occupied_mem = (self.total_occupied_mem - freed_mem).max(0.0);
        trace!(machine = m, cpus = freed_cpus, mem = freed_mem, "销账");
    }

    /// 按本账本的冲突检测模式判定一个 claim 是否已失效。
    pub fn causes_conflict(&self, claim: &ClaimDelta) -> bool {
        match self.conflict_mode {
            ConflictMode::SequenceNumbers => {
                self.machine_seq_nums[claim.machine] != claim.seq_num
            }
            ConflictMode::ResourceFit => {
                self.available_cpus(claim.machine) + RESOURCE_EPSILON < claim.cpus
                    || self.available_mem(claim.machine) + RESOURCE_EPSILON < claim.mem
            }
        }
    }

    /// 按提交模式提交一批 claim。
    ///
    /// incremental：逐个检查并生效，失效的进 `conflicted`。
    /// all-or-nothing：任一失效则回滚已生效的部分，整批进 `conflicted`。
    /// 注意回滚不回退版本号：一次失败的提交留下的版本推进是可见的。
    pub fn commit(&mut self, deltas: Vec<ClaimDelta>) -> CommitResult {
        let mut result = CommitResult::default();
        let mut deltas = deltas.into_iter();

        loop {
            let Some(delta) = deltas.next() else { break };
            let conflicted = if self.causes_conflict(&delta) {
                true
            } else {
                match self.apply(&delta, false) {
                    Ok(()) => false,
                    Err(err) => {
                        // 检查通过但记账失败只可能出现在 sequence-numbers
                        // 模式下版本恰好一致而资源已不够的情况，按冲突处理。
                        debug!(%err, machine = delta.machine, "提交时记账失败，视为冲突");
                        true
                    }
                }
            };
            if conflicted {
                result.conflicted.push(delta);
                if self.commit_mode == CommitMode::AllOrNothing {
                    result.conflicted.extend(deltas);
                    break;
                }
            } else {
                result.committed.push(delta);
            }
        }

        if self.commit_mode == CommitMode::AllOrNothing && !result.conflicted.is_empty() {
            for delta in result.committed.drain(..) {
                self.unapply(&delta);
                result.conflicted.push(delta);
            }
        }

        debug!(
            committed = result.committed.len(),
            conflicted = result.conflicted.len(),
            "批量提交完成"
        );
        result
    }
}
