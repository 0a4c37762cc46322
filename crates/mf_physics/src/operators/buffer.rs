// crates/mf_physics/src/operators/buffer.rs

//! 顶部海绵层
//!
//! `zstart` 以上把每个预报变量向参考廓线松弛，松弛率
//! `sigma * ((z - zstart) / (zsize - zstart))^beta`。
//! 参考廓线在初始化时取各变量的水平平均。

use mf_config::BufferSection;
use mf_fields::{FieldStore, Grid, Placement};
use mf_foundation::{KahanSum, MfError, MfResult};
use ndarray::s;
use tracing::debug;

use super::{PhysicsOperator, StepContext};

/// 海绵层算子
#[derive(Debug, Clone)]
pub struct Buffer {
    zstart: f64,
    sigma: f64,
    beta: f64,
    /// 每个预报变量的参考廓线，按局部 k 索引
    reference: Vec<Vec<f64>>,
}

impl Buffer {
    /// 由配置创建，`zstart` 必须低于区域顶部
    pub fn new(cfg: &BufferSection, grid: &Grid) -> MfResult<Self> {
        if cfg.zstart >= grid.zsize {
            return Err(MfError::config(format!(
                "buffer.zstart = {} 不低于区域高度 {}",
                cfg.zstart, grid.zsize
            )));
        }
        Ok(Self {
            zstart: cfg.zstart,
            sigma: cfg.sigma,
            beta: cfg.beta,
            reference: Vec::new(),
        })
    }

    fn rate(&self, z: f64, zsize: f64) -> f64 {
        if z < self.zstart {
            0.0
        } else {
            self.sigma * ((z - self.zstart) / (zsize - self.zstart)).powf(self.beta)
        }
    }

    /// 参考廓线
    pub fn reference(&self) -> &[Vec<f64>] {
        &self.reference
    }
}

impl PhysicsOperator for Buffer {
    fn name(&self) -> &'static str {
        "buffer"
    }

    fn initialize(&mut self, ctx: &StepContext<'_>, fields: &FieldStore) -> MfResult<()> {
        let sub = ctx.grid.sub;
        let kc = sub.kcells();
        let mut local = Vec::with_capacity(fields.prog.len() * kc);
        for field in &fields.prog {
            for k in 0..kc {
                let sum: KahanSum = field
                    .data
                    .slice(s![k, sub.jstart()..sub.jend(), sub.istart()..sub.iend()])
                    .iter()
                    .copied()
                    .collect();
                local.push(sum.value());
            }
        }
        let n = ctx.grid.horizontal_cells();
        let global = ctx.comm.all_reduce_sum_vec(&local)?;
        self.reference = global
            .chunks(kc)
            .map(|c| c.iter().map(|v| v / n).collect())
            .collect();
        debug!("海绵层参考廓线: {} 个变量", self.reference.len());
        Ok(())
    }

    fn exec(&mut self, ctx: &StepContext<'_>, fields: &mut FieldStore) -> MfResult<()> {
        if self.reference.len() != fields.prog.len() {
            return Err(MfError::programming("海绵层未初始化"));
        }
        let g = ctx.grid;
        let sub = g.sub;
        for ((field, tend), reference) in fields.prog.iter().zip(fields.tend.iter_mut()).zip(&self.reference) {
            let (kfirst, heights) = match field.placement {
                Placement::FaceZ => (sub.kstart() + 1, &g.zh),
                _ => (sub.kstart(), &g.z),
            };
            for k in kfirst..sub.kend() {
                let rate = self.rate(heights[k], g.zsize);
                if rate == 0.0 {
                    continue;
                }
                for j in sub.jstart()..sub.jend() {
                    for i in sub.istart()..sub.iend() {
                        tend.data[[k, j, i]] -= rate * (field.data[[k, j, i]] - reference[k]);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TimeState;
    use mf_config::FieldsSection;
    use mf_fields::{FIRST_SCALAR, U};
    use mf_parallel::{partition, GlobalExtent, HaloWidth, ThreadWorld, Topology};

    #[test]
    fn test_relaxes_toward_reference_above_zstart() {
        let out = ThreadWorld::run(1, |comm| {
            let topo = Topology::new(1, 0, 1, 1, true, true)?;
            let extent = GlobalExtent::new(2, 2, 4);
            let sub = partition(&topo, extent, HaloWidth::uniform(1))?;
            let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], None)?;
            let cfg = FieldsSection {
                scalars: vec!["s".into()],
                ..Default::default()
            };
            let mut fields = FieldStore::new(&cfg, &grid);
            fields.prog[U].fill(1.0);

            let time = TimeState::new(0, 0.0, 0.1);
            let ctx = StepContext { comm, grid: &grid, time: &time, subdt: 0.1 };
            let bc = BufferSection {
                enabled: true,
                zstart: 0.5,
                sigma: 2.0,
                beta: 1.0,
            };
            let mut buffer = Buffer::new(&bc, &grid)?;
            assert!(buffer.exec(&ctx, &mut fields).is_err());
            buffer.initialize(&ctx, &fields)?;

            // 偏离参考 0.5
            fields.prog[U].fill(1.5);
            buffer.exec(&ctx, &mut fields)?;
            let ut = &fields.tend[U].data;
            let (j, i) = (sub.jstart(), sub.istart());
            let low = ut[[sub.kstart() + 1, j, i]];
            let high = ut[[sub.kend() - 1, j, i]];
            Ok((low, high, fields.tend[FIRST_SCALAR].data[[sub.kend() - 1, j, i]]))
        })
        .unwrap();
        let (low, high, st) = out[0];
        assert_eq!(low, 0.0);
        // z = 0.875: 2 * 0.75 * 0.5
        assert!((high + 0.75).abs() < 1e-12);
        assert_eq!(st, 0.0);
    }
}
