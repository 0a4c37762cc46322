// crates/mf_physics/src/operators/mod.rs

//! 物理算子
//!
//! 每个算子只通过统一接口与时间循环交互：按配置创建、在首步前初始化、
//! 每个子步向倾向项累加贡献、给出稳定性数。算子按固定顺序组成列表，
//! 由时间循环依次调用。
//!
//! # 内置算子
//!
//! | 名称 | 配置节 | 贡献 |
//! |------|--------|------|
//! | `advection` | `advec` | 二阶通量形式对流 |
//! | `diffusion` | `diff` | 常系数二阶扩散 |
//! | `buoyancy` | `buoyancy` | 标量浮力作用于 w |
//! | `force` | `force` | 大尺度压力梯度或流量约束 |
//! | `buffer` | `buffer` | 顶部海绵层 |

mod advection;
mod buffer;
mod buoyancy;
mod diffusion;
mod force;

pub use advection::Advection;
pub use buffer::Buffer;
pub use buoyancy::Buoyancy;
pub use diffusion::Diffusion;
pub use force::Force;

use mf_config::{
    AdvecScheme, AdvecSection, BufferSection, BuoyancySection, ConfigSource, DiffScheme,
    DiffSection, ForceKind, ForceSection,
};
use mf_fields::{FieldStore, Grid};
use mf_foundation::{MfError, MfResult};
use mf_parallel::Communicator;
use tracing::info;

use crate::engine::TimeState;

/// 算子调用上下文
pub struct StepContext<'a> {
    /// 进程组
    pub comm: &'a dyn Communicator,
    /// 网格
    pub grid: &'a Grid,
    /// 时间状态（只读）
    pub time: &'a TimeState,
    /// 当前子步长
    pub subdt: f64,
}

/// 稳定性数的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityKind {
    /// Courant 数
    Courant,
    /// 扩散数
    Diffusion,
}

/// 稳定性数（已全局归约）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityNumber {
    /// 种类
    pub kind: StabilityKind,
    /// 数值
    pub value: f64,
}

/// 物理算子接口
pub trait PhysicsOperator: Send {
    /// 算子名
    fn name(&self) -> &'static str;

    /// 模板半径，不得超过晕区宽度
    fn stencil_radius(&self) -> usize {
        1
    }

    /// 首步前初始化
    fn initialize(&mut self, _ctx: &StepContext<'_>, _fields: &FieldStore) -> MfResult<()> {
        Ok(())
    }

    /// 向倾向项累加贡献
    fn exec(&mut self, ctx: &StepContext<'_>, fields: &mut FieldStore) -> MfResult<()>;

    /// 以当前时间步长计算的稳定性数；无限制时返回 `None`
    fn stability_number(&self, _ctx: &StepContext<'_>, _fields: &FieldStore) -> MfResult<Option<StabilityNumber>> {
        Ok(None)
    }
}

/// 按配置创建算子列表
///
/// 顺序固定为对流、扩散、浮力、强迫、海绵层；关闭的算子不进入列表。
pub fn build_operators(
    source: &ConfigSource,
    grid: &Grid,
    fields: &FieldStore,
) -> MfResult<Vec<Box<dyn PhysicsOperator>>> {
    let mut operators: Vec<Box<dyn PhysicsOperator>> = Vec::new();

    let advec: AdvecSection = source.section()?;
    if advec.swadvec != AdvecScheme::None {
        operators.push(Box::new(Advection::new()));
    }

    let diff: DiffSection = source.section()?;
    if diff.swdiff != DiffScheme::None {
        operators.push(Box::new(Diffusion::new()));
    }

    let buoyancy: BuoyancySection = source.section()?;
    if buoyancy.enabled {
        operators.push(Box::new(Buoyancy::new(&buoyancy, fields)?));
    }

    let force: ForceSection = source.section()?;
    if force.swlspres != ForceKind::None {
        operators.push(Box::new(Force::new(&force)));
    }

    let buffer: BufferSection = source.section()?;
    if buffer.enabled {
        operators.push(Box::new(Buffer::new(&buffer, grid)?));
    }

    let sub = &grid.sub;
    let halo = sub.igc.min(sub.jgc).min(sub.kgc);
    for op in &operators {
        if op.stencil_radius() > halo {
            return Err(MfError::config(format!(
                "算子 {} 的模板半径 {} 超过晕区宽度 {halo}",
                op.name(),
                op.stencil_radius()
            )));
        }
    }

    let names: Vec<&str> = operators.iter().map(|op| op.name()).collect();
    info!("物理算子: [{}]", names.join(", "));
    Ok(operators)
}

/// 二点平均
#[inline]
pub(crate) fn interp2(a: f64, b: f64) -> f64 {
    0.5 * (a + b)
}
