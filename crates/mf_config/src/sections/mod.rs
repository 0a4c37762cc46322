// crates/mf_config/src/sections/mod.rs

//! 配置节定义
//!
//! 每个组件只读取自己的顶层节：
//!
//! | 节名 | 类型 | 使用者 |
//! |------|------|--------|
//! | `mpi` | [`MpiSection`] | 进程网格 |
//! | `grid` | [`GridSection`] | 网格几何与分区 |
//! | `fields` | [`FieldsSection`] | 场存储 |
//! | `boundary` | [`BoundarySection`] | 边界条件 |
//! | `advec` / `diff` | [`AdvecSection`] / [`DiffSection`] | 对流、扩散算子 |
//! | `force` / `buoyancy` / `buffer` | [`ForceSection`] / [`BuoyancySection`] / [`BufferSection`] | 强迫、浮力、海绵层 |
//! | `pres` | [`PresSection`] | 压力投影 |
//! | `time` | [`TimeSection`] | 时间循环 |
//! | `stats` / `cross` | [`StatsSection`] / [`CrossSection`] | 统计与截面 |
//! | `init` | [`InitSection`] | 初始场生成 |

mod parallel;
mod physics;
mod runtime;

pub use parallel::{GridSection, MpiSection};
pub use physics::{
    AdvecScheme, AdvecSection, BoundarySection, BufferSection, BuoyancySection, DiffScheme,
    DiffSection, FieldsSection, ForceKind, ForceSection, InitSection, MomentumBc, PresSection,
    ScalarBc,
};
pub use runtime::{CrossSection, RunMode, StatsSection, TimeSection};

use crate::error::ConfigError;

/// 全部已知顶层节名
pub const KNOWN_SECTIONS: &[&str] = &[
    "mpi", "grid", "fields", "boundary", "advec", "diff", "force", "buoyancy", "buffer", "pres",
    "time", "stats", "cross", "init",
];

pub(crate) fn require_positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, value, "必须为有限正数"))
    }
}

pub(crate) fn require_non_negative(key: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, value, "必须为有限非负数"))
    }
}
