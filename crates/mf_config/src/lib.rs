// crates/mf_config/src/lib.rs

//! MicroFlow Config Layer (Layer 2)
//!
//! 配置层，提供命名配置源和各组件的配置节。
//!
//! # 模块概览
//!
//! - [`source`]: `ConfigSource` 配置源与 `ConfigSection` trait
//! - [`sections`]: 各组件的配置节及默认值
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: mf_cli      ─> 读取 <simname>.json
//! Layer 4: mf_physics  ─> 各组件按节名取配置
//! Layer 2: mf_config   (本层)
//! Layer 1: mf_foundation
//! ```
//!
//! # 设计原则
//!
//! 1. **按节隔离**: 组件只读取自己的顶层节
//! 2. **缺省可运行**: 节缺失时使用默认值
//! 3. **先校验后使用**: 取出节时立即调用 `validate`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod sections;
pub mod source;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出核心类型
pub use error::ConfigError;
pub use sections::*;
pub use source::{ConfigSection, ConfigSource};
