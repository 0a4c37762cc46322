// crates/mf_physics/src/lib.rs

//! MicroFlow Physics Layer (Layer 4)
//!
//! 物理算子、边界条件、压力投影与时间循环。
//!
//! # 模块概览
//!
//! - [`operators`]: 统一算子接口与内置二阶算子
//! - [`boundary`]: 晕区交换与壁面条件
//! - [`pressure`]: 基于转置与实数 DFT 的压力投影
//! - [`engine`]: 时间循环状态机、Runge-Kutta 积分与模型驱动
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: mf_cli
//! Layer 4: mf_physics (本层)
//! Layer 3: mf_fields, mf_stats
//! Layer 2: mf_config, mf_parallel, mf_io
//! Layer 1: mf_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod engine;
pub mod operators;
pub mod pressure;

/// 层级标识
pub const LAYER: u8 = 4;

// 重导出核心类型
pub use boundary::Boundary;
pub use engine::{LoopPhase, LowStorageRk, Model, TimeLoop, TimeState};
pub use operators::{build_operators, PhysicsOperator, StabilityKind, StabilityNumber, StepContext};
pub use pressure::{ColumnSolver, Pressure, ProjectionReport, RealDft, ThomasSolver};
