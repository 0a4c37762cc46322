// crates/mf_foundation/src/lib.rs

//! MicroFlow Foundation Layer (Layer 1)
//!
//! 基础层，提供整个项目共用的错误类型和数值工具。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `MfError` 与错误分类
//! - [`kahan`]: 补偿求和，用于局部和与跨进程合并
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: mf_cli
//! Layer 4: mf_physics   ─> 物理算子、压力投影、时间循环
//! Layer 3: mf_fields, mf_stats
//! Layer 2: mf_config, mf_parallel, mf_io
//! Layer 1: mf_foundation (本层)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod kahan;

/// 层级标识
pub const LAYER: u8 = 1;

// 重导出常用类型
pub use error::{ErrorKind, MfError, MfResult};
pub use kahan::KahanSum;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{ErrorKind, MfError, MfResult};
    pub use crate::kahan::KahanSum;
    pub use crate::ensure;
}
