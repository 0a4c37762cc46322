// crates/mf_stats/src/lib.rs

//! MicroFlow Statistics Layer (Layer 3)
//!
//! 在线诊断：垂直廓线统计与二维截面。两者对模拟状态只读。
//!
//! # 模块概览
//!
//! - [`stats`]: 平均值、中心矩与垂直通量廓线，可续写的统计文件
//! - [`cross`]: 汇集到根进程的二维截面
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: mf_physics  ─> 按统计间隔调用
//! Layer 3: mf_stats (本层), mf_fields
//! Layer 2: mf_config, mf_parallel, mf_io
//! Layer 1: mf_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cross;
pub mod stats;

/// 层级标识
pub const LAYER: u8 = 3;

// 重导出核心类型
pub use cross::{Cross, Orientation};
pub use stats::{Moment, ProfileKey, Stats};
