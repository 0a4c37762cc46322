// crates/mf_physics/src/operators/buoyancy.rs

//! 浮力：`wt += gβ · s`，标量插值到 w 所在的内部面

use mf_config::BuoyancySection;
use mf_fields::{FieldStore, FIRST_SCALAR, W};
use mf_foundation::{MfError, MfResult};

use super::{interp2, PhysicsOperator, StepContext};

/// 浮力算子
#[derive(Debug, Clone)]
pub struct Buoyancy {
    index: usize,
    gravitybeta: f64,
}

impl Buoyancy {
    /// 由配置创建，浮力变量必须是标量
    pub fn new(cfg: &BuoyancySection, fields: &FieldStore) -> MfResult<Self> {
        let index = fields
            .index_of(&cfg.variable)
            .filter(|&n| n >= FIRST_SCALAR)
            .ok_or_else(|| MfError::config(format!("buoyancy.variable: '{}' 不是标量", cfg.variable)))?;
        Ok(Self {
            index,
            gravitybeta: cfg.gravitybeta,
        })
    }
}

impl PhysicsOperator for Buoyancy {
    fn name(&self) -> &'static str {
        "buoyancy"
    }

    fn exec(&mut self, ctx: &StepContext<'_>, fields: &mut FieldStore) -> MfResult<()> {
        let sub = ctx.grid.sub;
        let s = &fields.prog[self.index].data;
        let wt = &mut fields.tend[W].data;
        for k in sub.kstart() + 1..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    wt[[k, j, i]] += self.gravitybeta * interp2(s[[k - 1, j, i]], s[[k, j, i]]);
                }
            }
        }
        Ok(())
    }
}
