//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列，并提供带仿真时长上限
//! 与墙钟预算的运行入口。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use crate::error::CoreError;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 队列中尚未执行的事件数
    pub fn pending_events(&self) -> usize {
        self.q.len()
    }

    /// 调度事件在指定时间执行
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });

        debug!(queue_size = self.q.len(), "事件已加入队列");
    }

    /// 调度事件在 `now + delay_secs` 执行。负数或非有限延迟是配置错误。
    pub fn after_delay<E: Event>(&mut self, delay_secs: f64, ev: E) -> Result<(), CoreError> {
        if !delay_secs.is_finite() || delay_secs < 0.0 {
            return Err(CoreError::NegativeDelay(delay_secs));
        }
        let at = self.now.saturating_add(SimTime::from_secs_f64(delay_secs));
        self.schedule(at, ev);
        Ok(())
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while let Some(top) = self.q.peek() {
            if top.at() > until {
                break;
            }
            let item = self.q.pop().expect("peek then pop");
            self.now = item.at;
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        self.run_bounded(None, None, world);
    }

    /// 带上限的运行：仿真时间超过 `run_time_limit`、世界报告停机、或墙钟
    /// 预算耗尽时停止。仅当墙钟预算耗尽时返回 `false`。
    pub fn run_bounded(
        &mut self,
        run_time_limit: Option<SimTime>,
        wall_clock_budget: Option<Duration>,
        world: &mut dyn World,
    ) -> bool {
        info!(limit = ?run_time_limit, "▶️  开始运行仿真");
        let started = Instant::now();
        let mut event_count: u64 = 0;

        while let Some(top) = self.q.peek() {
            if world.halted() {
                break;
            }
            if let Some(limit) = run_time_limit {
                if top.at() > limit {
                    self.now = self.now.max(limit);
                    break;
                }
            }
            if let Some(budget) = wall_clock_budget {
                if started.elapsed() >= budget {
                    info!(
                        events = event_count,
                        now = ?self.now,
                        "⏱️  墙钟预算耗尽，提前结束"
                    );
                    return false;
                }
            }

            let item = self.q.pop().expect("peek then pop");
            event_count = event_count.saturating_add(1);
            self.now = item.at;

            debug!(
                event_num = event_count,
                now = ?self.now,
                seq = item.seq,
                remaining_queue = self.q.len(),
                "执行事件"
            );

            item.ev.execute(self, world);
            world.on_tick(self);
        }

        info!(
            total_events = event_count,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
        true
    }
}
