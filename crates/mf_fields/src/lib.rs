// crates/mf_fields/src/lib.rs

//! MicroFlow Fields Layer (Layer 3)
//!
//! 网格几何与交错场存储。
//!
//! # 模块概览
//!
//! - [`grid`]: 交错网格坐标与层厚
//! - [`field`]: 含晕区的三维场
//! - [`store`]: 预报变量、倾向项与压力；快照读写与全局检查量
//! - [`init`]: 初始场生成
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: mf_physics  ─> 读写场与倾向项
//! Layer 3: mf_fields (本层), mf_stats
//! Layer 2: mf_config, mf_parallel, mf_io
//! Layer 1: mf_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod field;
pub mod grid;
pub mod init;
pub mod store;

/// 层级标识
pub const LAYER: u8 = 3;

// 重导出核心类型
pub use field::{Field3d, Placement};
pub use grid::Grid;
pub use init::apply_initial_state;
pub use store::{FieldStore, FIRST_SCALAR, U, V, W};
