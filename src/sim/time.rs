//! 仿真时间类型
//!
//! 定义仿真时间及其单位转换。调度器的 think time 与任务时长以秒（f64）
//! 表示，进入引擎前统一换算为纳秒。

/// 仿真时间（纳秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub fn from_micros(us: u64) -> SimTime {
        SimTime(us.saturating_mul(1_000))
    }
    pub fn from_millis(ms: u64) -> SimTime {
        SimTime(ms.saturating_mul(1_000_000))
    }
    pub fn from_secs(s: u64) -> SimTime {
        SimTime(s.saturating_mul(1_000_000_000))
    }

    /// 由秒（f64）换算。调用方负责保证非负、有限（见 `Simulator::after_delay`）。
    pub fn from_secs_f64(secs: f64) -> SimTime {
        debug_assert!(secs.is_finite() && secs >= 0.0);
        SimTime((secs * 1e9).round() as u64)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    pub fn saturating_add(self, other: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(other.0))
    }
}
