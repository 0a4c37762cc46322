// crates/mf_physics/src/operators/advection.rs

//! 二阶通量形式对流
//!
//! 面上的通量用相邻两点平均构造，动量与标量都写成散度形式，
//! 在周期区域上守恒。w 只更新内部面 `kstart+1..kend`，壁面上保持为零。

use mf_fields::{FieldStore, FIRST_SCALAR, U, V, W};
use mf_foundation::MfResult;

use super::{interp2, PhysicsOperator, StabilityKind, StabilityNumber, StepContext};

/// 二阶对流算子
#[derive(Debug, Default)]
pub struct Advection;

impl Advection {
    /// 创建
    pub fn new() -> Self {
        Self
    }

    /// 以时间步长 `dt` 计算的局部最大 Courant 数
    pub fn local_courant(fields: &FieldStore, ctx: &StepContext<'_>, dt: f64) -> f64 {
        let g = ctx.grid;
        let sub = g.sub;
        let (u, v, w) = (&fields.prog[U].data, &fields.prog[V].data, &fields.prog[W].data);
        let mut cfl: f64 = 0.0;
        for k in sub.kstart()..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    let c = interp2(u[[k, j, i]], u[[k, j, i + 1]]).abs() * g.dxi
                        + interp2(v[[k, j, i]], v[[k, j + 1, i]]).abs() * g.dyi
                        + interp2(w[[k, j, i]], w[[k + 1, j, i]]).abs() * g.dzi[k];
                    cfl = cfl.max(c);
                }
            }
        }
        cfl * dt
    }
}

impl PhysicsOperator for Advection {
    fn name(&self) -> &'static str {
        "advection"
    }

    fn exec(&mut self, ctx: &StepContext<'_>, fields: &mut FieldStore) -> MfResult<()> {
        let g = ctx.grid;
        let sub = g.sub;
        let (dxi, dyi) = (g.dxi, g.dyi);
        let (is, ie, js, je, ks, ke) = (sub.istart(), sub.iend(), sub.jstart(), sub.jend(), sub.kstart(), sub.kend());

        let prog = &fields.prog;
        let tend = &mut fields.tend;
        let (u, v, w) = (&prog[U].data, &prog[V].data, &prog[W].data);

        let ut = &mut tend[U].data;
        for k in ks..ke {
            for j in js..je {
                for i in is..ie {
                    ut[[k, j, i]] -= (interp2(u[[k, j, i]], u[[k, j, i + 1]]).powi(2)
                        - interp2(u[[k, j, i - 1]], u[[k, j, i]]).powi(2))
                        * dxi
                        + (interp2(v[[k, j + 1, i - 1]], v[[k, j + 1, i]]) * interp2(u[[k, j, i]], u[[k, j + 1, i]])
                            - interp2(v[[k, j, i - 1]], v[[k, j, i]]) * interp2(u[[k, j - 1, i]], u[[k, j, i]]))
                            * dyi
                        + (interp2(w[[k + 1, j, i - 1]], w[[k + 1, j, i]]) * interp2(u[[k, j, i]], u[[k + 1, j, i]])
                            - interp2(w[[k, j, i - 1]], w[[k, j, i]]) * interp2(u[[k - 1, j, i]], u[[k, j, i]]))
                            * g.dzi[k];
                }
            }
        }

        let vt = &mut tend[V].data;
        for k in ks..ke {
            for j in js..je {
                for i in is..ie {
                    vt[[k, j, i]] -= (interp2(u[[k, j - 1, i + 1]], u[[k, j, i + 1]]) * interp2(v[[k, j, i]], v[[k, j, i + 1]])
                        - interp2(u[[k, j - 1, i]], u[[k, j, i]]) * interp2(v[[k, j, i - 1]], v[[k, j, i]]))
                        * dxi
                        + (interp2(v[[k, j, i]], v[[k, j + 1, i]]).powi(2)
                            - interp2(v[[k, j - 1, i]], v[[k, j, i]]).powi(2))
                            * dyi
                        + (interp2(w[[k + 1, j - 1, i]], w[[k + 1, j, i]]) * interp2(v[[k, j, i]], v[[k + 1, j, i]])
                            - interp2(w[[k, j - 1, i]], w[[k, j, i]]) * interp2(v[[k - 1, j, i]], v[[k, j, i]]))
                            * g.dzi[k];
                }
            }
        }

        let wt = &mut tend[W].data;
        for k in ks + 1..ke {
            for j in js..je {
                for i in is..ie {
                    wt[[k, j, i]] -= (interp2(u[[k - 1, j, i + 1]], u[[k, j, i + 1]]) * interp2(w[[k, j, i]], w[[k, j, i + 1]])
                        - interp2(u[[k - 1, j, i]], u[[k, j, i]]) * interp2(w[[k, j, i - 1]], w[[k, j, i]]))
                        * dxi
                        + (interp2(v[[k - 1, j + 1, i]], v[[k, j + 1, i]]) * interp2(w[[k, j, i]], w[[k, j + 1, i]])
                            - interp2(v[[k - 1, j, i]], v[[k, j, i]]) * interp2(w[[k, j - 1, i]], w[[k, j, i]]))
                            * dyi
                        + (interp2(w[[k, j, i]], w[[k + 1, j, i]]).powi(2)
                            - interp2(w[[k - 1, j, i]], w[[k, j, i]]).powi(2))
                            * g.dzhi[k];
                }
            }
        }

        for n in FIRST_SCALAR..prog.len() {
            let s = &prog[n].data;
            let st = &mut tend[n].data;
            for k in ks..ke {
                for j in js..je {
                    for i in is..ie {
                        st[[k, j, i]] -= (u[[k, j, i + 1]] * interp2(s[[k, j, i]], s[[k, j, i + 1]])
                            - u[[k, j, i]] * interp2(s[[k, j, i - 1]], s[[k, j, i]]))
                            * dxi
                            + (v[[k, j + 1, i]] * interp2(s[[k, j, i]], s[[k, j + 1, i]])
                                - v[[k, j, i]] * interp2(s[[k, j - 1, i]], s[[k, j, i]]))
                                * dyi
                            + (w[[k + 1, j, i]] * interp2(s[[k, j, i]], s[[k + 1, j, i]])
                                - w[[k, j, i]] * interp2(s[[k - 1, j, i]], s[[k, j, i]]))
                                * g.dzi[k];
                    }
                }
            }
        }
        Ok(())
    }

    fn stability_number(&self, ctx: &StepContext<'_>, fields: &FieldStore) -> MfResult<Option<StabilityNumber>> {
        let local = Self::local_courant(fields, ctx, ctx.time.dt);
        Ok(Some(StabilityNumber {
            kind: StabilityKind::Courant,
            value: ctx.comm.max(local)?,
        }))
    }
}
