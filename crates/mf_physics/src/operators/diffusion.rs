// crates/mf_physics/src/operators/diffusion.rs

//! 常系数二阶扩散
//!
//! 动量使用 `fields.visc`，标量使用 `fields.viscs`（各场自带系数）。
//! 垂直方向在非均匀网格上按层厚离散，壁面条件由虚拟层体现。

use mf_fields::{FieldStore, Placement};
use mf_foundation::MfResult;

use super::{PhysicsOperator, StabilityKind, StabilityNumber, StepContext};

/// 二阶扩散算子
#[derive(Debug, Default)]
pub struct Diffusion;

impl Diffusion {
    /// 创建
    pub fn new() -> Self {
        Self
    }
}

impl PhysicsOperator for Diffusion {
    fn name(&self) -> &'static str {
        "diffusion"
    }

    fn exec(&mut self, ctx: &StepContext<'_>, fields: &mut FieldStore) -> MfResult<()> {
        let g = ctx.grid;
        let sub = g.sub;
        let (dxidxi, dyidyi) = (g.dxi * g.dxi, g.dyi * g.dyi);
        let (is, ie, js, je, ks, ke) = (sub.istart(), sub.iend(), sub.jstart(), sub.jend(), sub.kstart(), sub.kend());

        for (field, tend) in fields.prog.iter().zip(fields.tend.iter_mut()) {
            let (a, at, visc) = (&field.data, &mut tend.data, field.visc);
            match field.placement {
                Placement::FaceZ => {
                    for k in ks + 1..ke {
                        for j in js..je {
                            for i in is..ie {
                                at[[k, j, i]] += visc
                                    * ((a[[k, j, i + 1]] - 2.0 * a[[k, j, i]] + a[[k, j, i - 1]]) * dxidxi
                                        + (a[[k, j + 1, i]] - 2.0 * a[[k, j, i]] + a[[k, j - 1, i]]) * dyidyi
                                        + ((a[[k + 1, j, i]] - a[[k, j, i]]) * g.dzi[k]
                                            - (a[[k, j, i]] - a[[k - 1, j, i]]) * g.dzi[k - 1])
                                            * g.dzhi[k]);
                            }
                        }
                    }
                }
                _ => {
                    for k in ks..ke {
                        for j in js..je {
                            for i in is..ie {
                                at[[k, j, i]] += visc
                                    * ((a[[k, j, i + 1]] - 2.0 * a[[k, j, i]] + a[[k, j, i - 1]]) * dxidxi
                                        + (a[[k, j + 1, i]] - 2.0 * a[[k, j, i]] + a[[k, j - 1, i]]) * dyidyi
                                        + ((a[[k + 1, j, i]] - a[[k, j, i]]) * g.dzhi[k + 1]
                                            - (a[[k, j, i]] - a[[k - 1, j, i]]) * g.dzhi[k])
                                            * g.dzi[k]);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn stability_number(&self, ctx: &StepContext<'_>, fields: &FieldStore) -> MfResult<Option<StabilityNumber>> {
        let g = ctx.grid;
        let visc = fields.prog.iter().fold(0.0_f64, |m, f| m.max(f.visc));
        let dzidzi = g.max_dzi().powi(2);
        let value = ctx.time.dt * visc * (g.dxi * g.dxi + g.dyi * g.dyi + dzidzi);
        Ok(Some(StabilityNumber {
            kind: StabilityKind::Diffusion,
            value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TimeState;
    use mf_config::FieldsSection;
    use mf_fields::{Grid, FIRST_SCALAR};
    use mf_parallel::{partition, GlobalExtent, HaloWidth, ThreadWorld, Topology};

    #[test]
    fn test_linear_profile_and_diffusion_number() {
        let out = ThreadWorld::run(1, |comm| {
            let topo = Topology::new(1, 0, 1, 1, true, true)?;
            let extent = GlobalExtent::new(2, 2, 4);
            let sub = partition(&topo, extent, HaloWidth::uniform(1))?;
            let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], None)?;
            let cfg = FieldsSection {
                scalars: vec!["s".into()],
                visc: 0.1,
                viscs: 0.2,
                ..Default::default()
            };
            let mut fields = FieldStore::new(&cfg, &grid);
            // 线性廓线的二阶导数为零
            for k in 0..sub.kcells() {
                fields.prog[FIRST_SCALAR]
                    .data
                    .slice_mut(ndarray::s![k, .., ..])
                    .fill(3.0 * grid.z[k]);
            }
            let time = TimeState::new(0, 0.0, 0.01);
            let ctx = StepContext { comm, grid: &grid, time: &time, subdt: 0.01 };
            let mut diff = Diffusion::new();
            diff.exec(&ctx, &mut fields)?;
            let max_tend = fields.tend[FIRST_SCALAR].data.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            let dn = diff.stability_number(&ctx, &fields)?.map(|s| s.value);
            Ok((max_tend, dn))
        })
        .unwrap();
        let (max_tend, dn) = out[0];
        assert!(max_tend < 1e-12);
        // 0.01 * 0.2 * (4 + 4 + 16)
        assert!((dn.unwrap() - 0.048).abs() < 1e-14);
    }
}
