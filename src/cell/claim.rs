//! 资源声明（claim）
//!
//! 一次调度决策产生的单台机器上的资源预订。它是冲突检测的唯一单位：
//! 声明中记录的机器版本号与账本当前版本号不一致即为冲突。

use crate::sim::SimTime;

/// 调度器编号：在一次仿真中注册的调度器在世界里的下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulerId(pub usize);

/// 一台机器上的一次 CPU/内存预订。
///
/// `duration` 为 `None` 表示分配器的悲观锁定声明（例如构造 offer 时锁住
/// 剩余资源），不会产生到期释放事件。
#[derive(Debug, Clone)]
pub struct ClaimDelta {
    pub scheduler: SchedulerId,
    pub machine: usize,
    /// 创建时目标机器的版本号，提交时用于 sequence-numbers 校验。
    pub seq_num: u64,
    pub duration: Option<SimTime>,
    pub cpus: f64,
    pub mem: f64,
}
