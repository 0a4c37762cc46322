// crates/mf_config/src/sections/physics.rs

//! 场存储、物理算子、边界与初始场配置

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{require_non_negative, require_positive};
use crate::error::ConfigError;
use crate::source::ConfigSection;

// ============================================================
// 场存储
// ============================================================

/// 场存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsSection {
    /// 动量粘性系数 [m²/s]
    #[serde(default = "default_visc")]
    pub visc: f64,

    /// 标量扩散系数 [m²/s]
    #[serde(default = "default_visc")]
    pub viscs: f64,

    /// 预报标量名称
    #[serde(default)]
    pub scalars: Vec<String>,

    /// 快照与输出目录
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,
}

fn default_visc() -> f64 { 1e-5 }
fn default_datadir() -> PathBuf { PathBuf::from(".") }

impl Default for FieldsSection {
    fn default() -> Self {
        Self {
            visc: default_visc(),
            viscs: default_visc(),
            scalars: Vec::new(),
            datadir: default_datadir(),
        }
    }
}

impl ConfigSection for FieldsSection {
    const NAME: &'static str = "fields";

    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("fields.visc", self.visc)?;
        require_non_negative("fields.viscs", self.viscs)?;

        const RESERVED: [&str; 4] = ["u", "v", "w", "p"];
        for (n, name) in self.scalars.iter().enumerate() {
            if name.is_empty() || RESERVED.contains(&name.as_str()) {
                return Err(ConfigError::invalid("fields.scalars", name, "标量名为空或与保留名冲突"));
            }
            if self.scalars[..n].contains(name) {
                return Err(ConfigError::invalid("fields.scalars", name, "标量名重复"));
            }
        }
        Ok(())
    }
}

// ============================================================
// 边界条件
// ============================================================

/// 动量垂直边界类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MomentumBc {
    /// 无滑移
    NoSlip,
    /// 自由滑移
    FreeSlip,
}

/// 标量垂直边界类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarBc {
    /// 给定边界值
    Dirichlet,
    /// 给定法向梯度
    Neumann,
}

/// 边界条件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundarySection {
    /// 底部动量边界
    #[serde(default = "default_mbcbot")]
    pub mbcbot: MomentumBc,
    /// 顶部动量边界
    #[serde(default = "default_mbctop")]
    pub mbctop: MomentumBc,
    /// 底部标量边界
    #[serde(default = "default_sbc")]
    pub sbcbot: ScalarBc,
    /// 顶部标量边界
    #[serde(default = "default_sbc")]
    pub sbctop: ScalarBc,
    /// 底部标量边界值（Dirichlet 为值，Neumann 为梯度）
    #[serde(default)]
    pub sbot: f64,
    /// 顶部标量边界值
    #[serde(default)]
    pub stop: f64,
}

fn default_mbcbot() -> MomentumBc { MomentumBc::NoSlip }
fn default_mbctop() -> MomentumBc { MomentumBc::FreeSlip }
fn default_sbc() -> ScalarBc { ScalarBc::Neumann }

impl Default for BoundarySection {
    fn default() -> Self {
        Self {
            mbcbot: default_mbcbot(),
            mbctop: default_mbctop(),
            sbcbot: default_sbc(),
            sbctop: default_sbc(),
            sbot: 0.0,
            stop: 0.0,
        }
    }
}

impl ConfigSection for BoundarySection {
    const NAME: &'static str = "boundary";

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.sbot.is_finite() || !self.stop.is_finite() {
            return Err(ConfigError::invalid("boundary.sbot/stop", self.sbot, "边界值必须有限"));
        }
        Ok(())
    }
}

// ============================================================
// 对流与扩散
// ============================================================

/// 对流格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdvecScheme {
    /// 关闭对流
    None,
    /// 二阶中心通量格式
    #[default]
    #[serde(rename = "2")]
    Second,
}

/// 对流配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdvecSection {
    /// 格式
    #[serde(default)]
    pub swadvec: AdvecScheme,
}

impl ConfigSection for AdvecSection {
    const NAME: &'static str = "advec";
}

/// 扩散格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiffScheme {
    /// 关闭扩散
    None,
    /// 二阶常粘性
    #[default]
    #[serde(rename = "2")]
    Second,
}

/// 扩散配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffSection {
    /// 格式
    #[serde(default)]
    pub swdiff: DiffScheme,
}

impl ConfigSection for DiffSection {
    const NAME: &'static str = "diff";
}

// ============================================================
// 大尺度强迫、浮力、海绵层
// ============================================================

/// 强迫类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForceKind {
    /// 无强迫
    #[default]
    None,
    /// 恒定大尺度压力梯度
    Dpdx,
    /// 保持区域平均流量
    Uflux,
}

/// 大尺度强迫配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForceSection {
    /// 强迫类型
    #[serde(default)]
    pub swlspres: ForceKind,
    /// 压力梯度 dp/dx
    #[serde(default)]
    pub dpdx: f64,
    /// 目标区域平均 u
    #[serde(default)]
    pub uflux: f64,
}

impl ConfigSection for ForceSection {
    const NAME: &'static str = "force";

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.dpdx.is_finite() {
            return Err(ConfigError::invalid("force.dpdx", self.dpdx, "必须有限"));
        }
        if !self.uflux.is_finite() {
            return Err(ConfigError::invalid("force.uflux", self.uflux, "必须有限"));
        }
        Ok(())
    }
}

/// 浮力配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuoyancySection {
    /// 是否启用
    #[serde(default)]
    pub enabled: bool,
    /// 浮力标量名
    #[serde(default = "default_buoyancy_variable")]
    pub variable: String,
    /// g·β 系数
    #[serde(default = "default_gravitybeta")]
    pub gravitybeta: f64,
}

fn default_buoyancy_variable() -> String { "s".to_string() }
fn default_gravitybeta() -> f64 { 1.0 }

impl Default for BuoyancySection {
    fn default() -> Self {
        Self {
            enabled: false,
            variable: default_buoyancy_variable(),
            gravitybeta: default_gravitybeta(),
        }
    }
}

impl ConfigSection for BuoyancySection {
    const NAME: &'static str = "buoyancy";

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravitybeta.is_finite() {
            return Err(ConfigError::invalid("buoyancy.gravitybeta", self.gravitybeta, "必须有限"));
        }
        Ok(())
    }
}

/// 海绵层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferSection {
    /// 是否启用
    #[serde(default)]
    pub enabled: bool,
    /// 海绵层起始高度 [m]
    #[serde(default)]
    pub zstart: f64,
    /// 最大松弛率 [1/s]
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// 松弛率随高度的幂次
    #[serde(default = "default_beta")]
    pub beta: f64,
}

fn default_sigma() -> f64 { 2.0 }
fn default_beta() -> f64 { 2.0 }

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            enabled: false,
            zstart: 0.0,
            sigma: default_sigma(),
            beta: default_beta(),
        }
    }
}

impl ConfigSection for BufferSection {
    const NAME: &'static str = "buffer";

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled {
            require_non_negative("buffer.zstart", self.zstart)?;
            require_positive("buffer.sigma", self.sigma)?;
            require_positive("buffer.beta", self.beta)?;
        }
        Ok(())
    }
}

// ============================================================
// 压力投影
// ============================================================

/// 压力投影配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresSection {
    /// 散度残差容差
    #[serde(default = "default_pres_tolerance")]
    pub tolerance: f64,
}

fn default_pres_tolerance() -> f64 { 1e-8 }

impl Default for PresSection {
    fn default() -> Self {
        Self {
            tolerance: default_pres_tolerance(),
        }
    }
}

impl ConfigSection for PresSection {
    const NAME: &'static str = "pres";

    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("pres.tolerance", self.tolerance)
    }
}

// ============================================================
// 初始场
// ============================================================

/// 初始场生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitSection {
    /// 背景 u [m/s]
    #[serde(default)]
    pub u0: f64,
    /// 背景 v [m/s]
    #[serde(default)]
    pub v0: f64,
    /// 标量底部值
    #[serde(default)]
    pub s0: f64,
    /// 标量垂直梯度
    #[serde(default)]
    pub sgrad: f64,
    /// 随机扰动幅值
    #[serde(default)]
    pub rndamp: f64,
    /// 随机扰动作用高度上限 [m]
    #[serde(default)]
    pub rndz: f64,
    /// 随机种子（各进程加上自身编号）
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 { 2 }

impl Default for InitSection {
    fn default() -> Self {
        Self {
            u0: 0.0,
            v0: 0.0,
            s0: 0.0,
            sgrad: 0.0,
            rndamp: 0.0,
            rndz: 0.0,
            seed: default_seed(),
        }
    }
}

impl ConfigSection for InitSection {
    const NAME: &'static str = "init";

    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("init.rndamp", self.rndamp)?;
        require_non_negative("init.rndz", self.rndz)?;
        Ok(())
    }
}
