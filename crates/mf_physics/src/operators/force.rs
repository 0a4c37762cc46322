// crates/mf_physics/src/operators/force.rs

//! 大尺度强迫
//!
//! - `dpdx`：恒定压力梯度，`ut -= dpdx`
//! - `uflux`：体积力使本子步结束时区域平均 u 等于目标值，
//!   `f = (uflux - <u>) / subdt - <ut>`

use mf_config::{ForceKind, ForceSection};
use mf_fields::{FieldStore, Grid, U};
use mf_foundation::{KahanSum, MfError, MfResult};
use mf_parallel::Communicator;
use ndarray::Array3;

use super::{PhysicsOperator, StepContext};

/// 大尺度强迫算子
#[derive(Debug, Clone)]
pub struct Force {
    kind: ForceKind,
    dpdx: f64,
    uflux: f64,
}

impl Force {
    /// 由配置创建
    pub fn new(cfg: &ForceSection) -> Self {
        Self {
            kind: cfg.swlspres,
            dpdx: cfg.dpdx,
            uflux: cfg.uflux,
        }
    }
}

/// 按层厚加权的区域平均
pub(crate) fn volume_mean(comm: &dyn Communicator, grid: &Grid, data: &Array3<f64>) -> MfResult<f64> {
    let sub = grid.sub;
    let mut sum = KahanSum::new();
    for k in sub.kstart()..sub.kend() {
        for j in sub.jstart()..sub.jend() {
            for i in sub.istart()..sub.iend() {
                sum.add(data[[k, j, i]] * grid.dz[k]);
            }
        }
    }
    Ok(comm.sum(sum.value())? / (grid.horizontal_cells() * grid.zsize))
}

impl PhysicsOperator for Force {
    fn name(&self) -> &'static str {
        "force"
    }

    fn exec(&mut self, ctx: &StepContext<'_>, fields: &mut FieldStore) -> MfResult<()> {
        let fbody = match self.kind {
            ForceKind::None => return Ok(()),
            ForceKind::Dpdx => -self.dpdx,
            ForceKind::Uflux => {
                if ctx.subdt <= 0.0 {
                    return Err(MfError::programming(format!("流量强迫需要正的子步长, 实际 {}", ctx.subdt)));
                }
                let umean = volume_mean(ctx.comm, ctx.grid, &fields.prog[U].data)?;
                let utmean = volume_mean(ctx.comm, ctx.grid, &fields.tend[U].data)?;
                (self.uflux - umean) / ctx.subdt - utmean
            }
        };

        let sub = ctx.grid.sub;
        let ut = &mut fields.tend[U].data;
        for k in sub.kstart()..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    ut[[k, j, i]] += fbody;
                }
            }
        }
        Ok(())
    }
}
