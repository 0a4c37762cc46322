// crates/mf_config/src/sections/runtime.rs

//! 时间循环、统计与截面配置

use serde::{Deserialize, Serialize};

use super::{require_non_negative, require_positive};
use crate::error::ConfigError;
use crate::source::ConfigSection;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 显式推进
    #[default]
    Prognostic,
    /// 重放已存快照做诊断
    Replay,
}

/// 时间循环配置
///
/// 输出间隔以迭代步计，0 表示关闭。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSection {
    /// 运行模式
    #[serde(default)]
    pub mode: RunMode,

    /// 低存储 Runge-Kutta 阶数（1、3 或 4）
    #[serde(default = "default_rkorder")]
    pub rkorder: u32,

    /// 初始时间步长 [s]
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// 最大时间步长 [s]
    #[serde(default = "default_dtmax")]
    pub dtmax: f64,

    /// 是否自适应时间步长
    #[serde(default = "default_adaptive")]
    pub adaptive: bool,

    /// 目标 Courant 数
    #[serde(default = "default_cflmax")]
    pub cflmax: f64,

    /// 目标扩散数
    #[serde(default = "default_dnmax")]
    pub dnmax: f64,

    /// 结束时间 [s]
    #[serde(default = "default_endtime")]
    pub endtime: f64,

    /// 起始迭代步（从该步的快照启动）
    #[serde(default)]
    pub start_iteration: u64,

    /// 最大迭代步数上限
    #[serde(default)]
    pub max_iterations: Option<u64>,

    /// 快照保存间隔
    #[serde(default)]
    pub save_interval: u64,

    /// 统计间隔
    #[serde(default)]
    pub stats_interval: u64,

    /// 检查输出间隔
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// 重放步幅
    #[serde(default)]
    pub postproc_stride: u64,

    /// 重放最后迭代步
    #[serde(default)]
    pub end_iteration: u64,
}

fn default_rkorder() -> u32 { 3 }
fn default_dt() -> f64 { 0.01 }
fn default_dtmax() -> f64 { 1e30 }
fn default_adaptive() -> bool { true }
fn default_cflmax() -> f64 { 1.0 }
fn default_dnmax() -> f64 { 0.4 }
fn default_endtime() -> f64 { 1.0 }
fn default_check_interval() -> u64 { 1 }

impl Default for TimeSection {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            rkorder: default_rkorder(),
            dt: default_dt(),
            dtmax: default_dtmax(),
            adaptive: default_adaptive(),
            cflmax: default_cflmax(),
            dnmax: default_dnmax(),
            endtime: default_endtime(),
            start_iteration: 0,
            max_iterations: None,
            save_interval: 0,
            stats_interval: 0,
            check_interval: default_check_interval(),
            postproc_stride: 0,
            end_iteration: 0,
        }
    }
}

impl ConfigSection for TimeSection {
    const NAME: &'static str = "time";

    fn validate(&self) -> Result<(), ConfigError> {
        if ![1, 3, 4].contains(&self.rkorder) {
            return Err(ConfigError::invalid("time.rkorder", self.rkorder, "仅支持 1、3、4 阶"));
        }
        require_positive("time.dt", self.dt)?;
        require_positive("time.dtmax", self.dtmax)?;
        require_positive("time.cflmax", self.cflmax)?;
        require_positive("time.dnmax", self.dnmax)?;
        require_non_negative("time.endtime", self.endtime)?;

        if self.mode == RunMode::Replay {
            if self.postproc_stride == 0 {
                return Err(ConfigError::invalid(
                    "time.postproc_stride",
                    self.postproc_stride,
                    "重放模式下步幅必须为正",
                ));
            }
            if self.end_iteration < self.start_iteration {
                return Err(ConfigError::invalid(
                    "time.end_iteration",
                    self.end_iteration,
                    format!("不能小于 start_iteration={}", self.start_iteration),
                ));
            }
        }
        Ok(())
    }
}

/// 统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsSection {
    /// 是否启用
    #[serde(default = "default_stats_enabled")]
    pub enabled: bool,

    /// 统计变量，空表示全部预报变量
    #[serde(default)]
    pub variables: Vec<String>,
}

fn default_stats_enabled() -> bool { true }

impl Default for StatsSection {
    fn default() -> Self {
        Self {
            enabled: default_stats_enabled(),
            variables: Vec::new(),
        }
    }
}

impl ConfigSection for StatsSection {
    const NAME: &'static str = "stats";
}

/// 截面配置
///
/// 索引均为全局网格索引（不含虚拟层）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossSection {
    /// 输出截面的变量
    #[serde(default)]
    pub variables: Vec<String>,
    /// xy 截面的 k 索引
    #[serde(default)]
    pub xy: Vec<usize>,
    /// xz 截面的 j 索引
    #[serde(default)]
    pub xz: Vec<usize>,
    /// yz 截面的 i 索引
    #[serde(default)]
    pub yz: Vec<usize>,
}

impl ConfigSection for CrossSection {
    const NAME: &'static str = "cross";
}

impl CrossSection {
    /// 是否有任何截面输出
    pub fn is_active(&self) -> bool {
        !self.variables.is_empty() && !(self.xy.is_empty() && self.xz.is_empty() && self.yz.is_empty())
    }
}
