//! 集群资源模型
//!
//! 此模块包含资源账本、资源声明、作业与工作负载等数据模型。

// 子模块声明
mod cell_state;
mod claim;
mod job;
mod workload;

// 重新导出公共接口
pub use cell_state::{CellState, CommitMode, CommitResult, ConflictMode, RESOURCE_EPSILON};
pub use claim::{ClaimDelta, SchedulerId};
pub use job::Job;
pub use workload::Workload;
