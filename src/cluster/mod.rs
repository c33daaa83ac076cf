//! 集群仿真模块
//!
//! 此模块包含仿真世界、集群事件与驱动：把账本、调度器与工作负载
//! 接到事件引擎上并对外暴露运行与统计接口。

// 子模块声明
pub mod events;
mod driver;
mod experiment;
mod world;

// 重新导出公共接口
pub use driver::ClusterSimulator;
pub use experiment::{
    CellSpec, ExperimentSpec, JobClassSpec, SyntheticWorkloadSpec, ThinkTimeSpec,
};
pub use world::ClusterWorld;
