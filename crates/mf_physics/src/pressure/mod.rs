// crates/mf_physics/src/pressure/mod.rs

//! 压力投影
//!
//! 求解离散 Poisson 方程并从倾向项中减去压力梯度，使子步结束时的速度场无散。
//!
//! # 流程
//!
//! 1. 右端项：`div(u / subdt + ut)`，在原生分解（`ZLocal`）上计算
//! 2. `Z→X` 后沿 x 做实数 DFT，`X→Y` 后沿 y 做实数 DFT，再 `Y→Z`
//! 3. 每个水平波数一条垂直三对角方程，由 [`ColumnSolver`] 求解，平均模态固定为零
//! 4. 逆向路径回到 `ZLocal`，写入压力场
//! 5. 从 `ut`、`vt`、`wt` 中减去压力梯度
//!
//! 水平方向必须是周期的。

mod spectral;
mod tridiag;

pub use spectral::RealDft;
pub use tridiag::{ColumnSolver, ThomasSolver};

use mf_config::PresSection;
use mf_fields::{FieldStore, Grid, U, V, W};
use mf_foundation::{MfError, MfResult};
use mf_parallel::{
    partition_all, Communicator, HaloExchanger, HaloWidth, PencilBuffer, PencilMode, Subdomain,
    Topology, Transposer,
};
use ndarray::{s, Array3, Axis};
use tracing::debug;

/// 投影结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionReport {
    /// 投影后全局最大散度 `|div(u + subdt * ut)|`
    pub residual: f64,
    /// 容差
    pub tolerance: f64,
}

impl ProjectionReport {
    /// 残差是否在容差内
    pub fn converged(&self) -> bool {
        self.residual <= self.tolerance
    }

    /// 残差超限时给出数值错误（非致命）
    pub fn status(&self) -> MfResult<()> {
        if self.converged() {
            Ok(())
        } else {
            Err(MfError::numerical("压力投影残差", self.residual, self.tolerance))
        }
    }
}

/// 预计算的谱系数
#[derive(Debug, Clone)]
struct SpectralPlan {
    dft_x: RealDft,
    dft_y: RealDft,
    /// 按全局 i 位置的 x 特征值
    lambda_x: Vec<f64>,
    /// 按全局 j 位置的 y 特征值
    lambda_y: Vec<f64>,
    /// 三对角下对角（按全局 k）
    a: Vec<f64>,
    /// 三对角上对角（按全局 k）
    c: Vec<f64>,
    /// 层厚（按全局 k）
    dz: Vec<f64>,
}

/// 压力求解器
pub struct Pressure {
    tolerance: f64,
    periodic: bool,
    halo: HaloExchanger,
    transposer: Transposer,
    solver: Box<dyn ColumnSolver>,
    plan: Option<SpectralPlan>,
}

impl Pressure {
    /// 创建求解器（默认 Thomas 列求解）
    pub fn new(cfg: &PresSection, topo: &Topology, grid: &Grid) -> MfResult<Self> {
        let sub = grid.sub;
        let halo = HaloWidth {
            igc: sub.igc,
            jgc: sub.jgc,
            kgc: sub.kgc,
        };
        let subdomains = partition_all(topo, grid.extent, halo)?;
        Ok(Self {
            tolerance: cfg.tolerance,
            periodic: topo.periodic_x() && topo.periodic_y(),
            halo: HaloExchanger::new(topo, &sub),
            transposer: Transposer::new(topo, grid.extent, &subdomains)?,
            solver: Box::new(ThomasSolver),
            plan: None,
        })
    }

    /// 替换列求解器
    pub fn with_solver(mut self, solver: Box<dyn ColumnSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// 容差
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// 预计算特征值、变换表与垂直系数
    pub fn setvalues(&mut self, grid: &Grid) -> MfResult<()> {
        if !self.periodic {
            return Err(MfError::config("压力求解要求水平方向周期边界"));
        }
        let extent = grid.extent;
        let dft_x = RealDft::new(extent.itot);
        let dft_y = RealDft::new(extent.jtot);
        let lambda_x = (0..extent.itot).map(|p| dft_x.eigenvalue(p, grid.dxi)).collect();
        let lambda_y = (0..extent.jtot).map(|p| dft_y.eigenvalue(p, grid.dyi)).collect();

        let ks = grid.sub.kstart();
        let ktot = extent.ktot;
        let mut a = vec![0.0; ktot];
        let mut c = vec![0.0; ktot];
        let mut dz = vec![0.0; ktot];
        for g in 0..ktot {
            let k = ks + g;
            dz[g] = grid.dz[k];
            if g > 0 {
                a[g] = grid.dzhi[k];
            }
            if g + 1 < ktot {
                c[g] = grid.dzhi[k + 1];
            }
        }

        debug!("压力求解: {}x{} 个水平模态, {} 层", extent.itot, extent.jtot, ktot);
        self.plan = Some(SpectralPlan {
            dft_x,
            dft_y,
            lambda_x,
            lambda_y,
            a,
            c,
            dz,
        });
        Ok(())
    }

    /// 投影：求压力并修正倾向项
    pub fn exec(
        &self,
        comm: &dyn Communicator,
        grid: &Grid,
        fields: &mut FieldStore,
        subdt: f64,
    ) -> MfResult<ProjectionReport> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| MfError::programming("压力求解器在 setvalues 之前被调用"))?;
        if subdt <= 0.0 {
            return Err(MfError::programming(format!("压力投影需要正的子步长, 实际 {subdt}")));
        }
        let sub = grid.sub;

        for n in [U, V, W] {
            self.halo.exchange(comm, &mut fields.tend[n].data)?;
        }
        let wt = &mut fields.tend[W].data;
        wt.index_axis_mut(Axis(0), sub.kstart()).fill(0.0);
        wt.index_axis_mut(Axis(0), sub.kend()).fill(0.0);

        let rhs = self.rhs(grid, fields, subdt);
        let p = self.solve(comm, plan, rhs)?;
        self.transposer.to_field(&p, &sub, &mut fields.p.data)?;

        self.halo.exchange(comm, &mut fields.p.data)?;
        pressure_ghosts(&sub, &mut fields.p.data);
        subtract_gradient(grid, fields);

        self.halo.exchange(comm, &mut fields.tend[U].data)?;
        self.halo.exchange(comm, &mut fields.tend[V].data)?;
        let residual = comm.max(max_divergence(grid, fields, Some(subdt)))?;
        Ok(ProjectionReport {
            residual,
            tolerance: self.tolerance,
        })
    }

    /// 当前速度场的全局最大散度（仅诊断）
    pub fn check(&self, comm: &dyn Communicator, grid: &Grid, fields: &FieldStore) -> MfResult<f64> {
        comm.max(max_divergence(grid, fields, None))
    }

    fn rhs(&self, grid: &Grid, fields: &FieldStore, subdt: f64) -> PencilBuffer {
        let sub = grid.sub;
        let dti = 1.0 / subdt;
        let (u, v, w) = (&fields.prog[U].data, &fields.prog[V].data, &fields.prog[W].data);
        let (ut, vt, wt) = (&fields.tend[U].data, &fields.tend[V].data, &fields.tend[W].data);
        let mut buf = self.transposer.zeros(PencilMode::ZLocal);
        for (kk, k) in (sub.kstart()..sub.kend()).enumerate() {
            for (jj, j) in (sub.jstart()..sub.jend()).enumerate() {
                for (ii, i) in (sub.istart()..sub.iend()).enumerate() {
                    buf.data[[kk, jj, ii]] = ((ut[[k, j, i + 1]] + u[[k, j, i + 1]] * dti)
                        - (ut[[k, j, i]] + u[[k, j, i]] * dti))
                        * grid.dxi
                        + ((vt[[k, j + 1, i]] + v[[k, j + 1, i]] * dti) - (vt[[k, j, i]] + v[[k, j, i]] * dti))
                            * grid.dyi
                        + ((wt[[k + 1, j, i]] + w[[k + 1, j, i]] * dti) - (wt[[k, j, i]] + w[[k, j, i]] * dti))
                            * grid.dzi[k];
                }
            }
        }
        buf
    }

    fn solve(&self, comm: &dyn Communicator, plan: &SpectralPlan, rhs: PencilBuffer) -> MfResult<PencilBuffer> {
        let t = &self.transposer;

        let mut x = t.transpose(comm, &rhs, PencilMode::XLocal)?;
        plan.dft_x.transform_lanes(&mut x.data, 2, false)?;
        let mut y = t.transpose(comm, &x, PencilMode::YLocal)?;
        plan.dft_y.transform_lanes(&mut y.data, 1, false)?;
        let mut z = t.transpose(comm, &y, PencilMode::ZLocal)?;

        self.solve_columns(plan, &mut z)?;

        let mut y = t.transpose(comm, &z, PencilMode::YLocal)?;
        plan.dft_y.transform_lanes(&mut y.data, 1, true)?;
        let mut x = t.transpose(comm, &y, PencilMode::XLocal)?;
        plan.dft_x.transform_lanes(&mut x.data, 2, true)?;
        let mut p = t.transpose(comm, &x, PencilMode::ZLocal)?;

        let scale = 1.0 / (plan.dft_x.len() * plan.dft_y.len()) as f64;
        p.data.mapv_inplace(|v| v * scale);
        Ok(p)
    }

    fn solve_columns(&self, plan: &SpectralPlan, buf: &mut PencilBuffer) -> MfResult<()> {
        let (nk, nj, ni) = buf.data.dim();
        MfError::check_len("压力列长度", plan.dz.len(), nk)?;
        let block = buf.block;
        let mut b = vec![0.0; nk];
        let mut c = plan.c.clone();
        let mut d = vec![0.0; nk];
        for j in 0..nj {
            for i in 0..ni {
                let (gi, gj) = (block.i0 + i, block.j0 + j);
                let lambda = plan.lambda_x[gi] + plan.lambda_y[gj];
                c.copy_from_slice(&plan.c);
                for k in 0..nk {
                    b[k] = plan.dz[k] * lambda - plan.a[k] - plan.c[k];
                    d[k] = buf.data[[k, j, i]] * plan.dz[k];
                }
                if gi == 0 && gj == 0 {
                    b[0] = 1.0;
                    c[0] = 0.0;
                    d[0] = 0.0;
                }
                self.solver.solve(&plan.a, &b, &c, &mut d)?;
                for k in 0..nk {
                    buf.data[[k, j, i]] = d[k];
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pressure")
            .field("tolerance", &self.tolerance)
            .field("periodic", &self.periodic)
            .field("ready", &self.plan.is_some())
            .finish()
    }
}

/// 压力的垂直虚拟层：零法向梯度
fn pressure_ghosts(sub: &Subdomain, p: &mut Array3<f64>) {
    let (ks, ke) = (sub.kstart(), sub.kend());
    for n in 0..sub.kgc {
        let bottom = p.index_axis(Axis(0), ks).to_owned();
        p.index_axis_mut(Axis(0), ks - 1 - n).assign(&bottom);
        let top = p.index_axis(Axis(0), ke - 1).to_owned();
        p.index_axis_mut(Axis(0), ke + n).assign(&top);
    }
}

fn subtract_gradient(grid: &Grid, fields: &mut FieldStore) {
    let sub = grid.sub;
    let p = &fields.p.data;
    let (is, ie, js, je, ks, ke) = (sub.istart(), sub.iend(), sub.jstart(), sub.jend(), sub.kstart(), sub.kend());

    let ut = &mut fields.tend[U].data;
    for k in ks..ke {
        for j in js..je {
            for i in is..ie {
                ut[[k, j, i]] -= (p[[k, j, i]] - p[[k, j, i - 1]]) * grid.dxi;
            }
        }
    }
    let vt = &mut fields.tend[V].data;
    for k in ks..ke {
        for j in js..je {
            for i in is..ie {
                vt[[k, j, i]] -= (p[[k, j, i]] - p[[k, j - 1, i]]) * grid.dyi;
            }
        }
    }
    let wt = &mut fields.tend[W].data;
    for k in ks + 1..ke {
        for j in js..je {
            for i in is..ie {
                wt[[k, j, i]] -= (p[[k, j, i]] - p[[k - 1, j, i]]) * grid.dzhi[k];
            }
        }
    }
}

/// 本地最大散度；给出子步长时计算 `u + subdt * ut` 的散度
fn max_divergence(grid: &Grid, fields: &FieldStore, subdt: Option<f64>) -> f64 {
    let sub = grid.sub;
    let vel = |n: usize, idx: [usize; 3]| match subdt {
        Some(dt) => fields.prog[n].data[idx] + dt * fields.tend[n].data[idx],
        None => fields.prog[n].data[idx],
    };
    let interior = fields.prog[U]
        .data
        .slice(s![sub.kstart()..sub.kend(), sub.jstart()..sub.jend(), sub.istart()..sub.iend()]);
    let mut max = 0.0_f64;
    for ((kk, jj, ii), _) in interior.indexed_iter() {
        let (k, j, i) = (sub.kstart() + kk, sub.jstart() + jj, sub.istart() + ii);
        let div = (vel(U, [k, j, i + 1]) - vel(U, [k, j, i])) * grid.dxi
            + (vel(V, [k, j + 1, i]) - vel(V, [k, j, i])) * grid.dyi
            + (vel(W, [k + 1, j, i]) - vel(W, [k, j, i])) * grid.dzi[k];
        max = max.max(div.abs());
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_config::FieldsSection;
    use mf_parallel::{partition, GlobalExtent, ThreadWorld};

    fn setup(periodic: bool) -> (Topology, Grid) {
        let topo = Topology::new(1, 0, 1, 1, periodic, periodic).unwrap();
        let extent = GlobalExtent::new(4, 4, 3);
        let sub = partition(&topo, extent, HaloWidth::uniform(1)).unwrap();
        let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], None).unwrap();
        (topo, grid)
    }

    #[test]
    fn test_rejects_non_periodic() {
        let (topo, grid) = setup(false);
        let mut pres = Pressure::new(&PresSection::default(), &topo, &grid).unwrap();
        let err = pres.setvalues(&grid).unwrap_err();
        assert_eq!(err.kind(), mf_foundation::ErrorKind::Configuration);
    }

    #[test]
    fn test_exec_before_setvalues_is_programming_error() {
        let (topo, grid) = setup(true);
        let pres = Pressure::new(&PresSection::default(), &topo, &grid).unwrap();
        let out = ThreadWorld::run(1, |comm| {
            let mut fields = FieldStore::new(&FieldsSection::default(), &grid);
            Ok(pres.exec(comm, &grid, &mut fields, 0.1).map_err(|e| e.kind()))
        })
        .unwrap();
        assert_eq!(out[0], Err(mf_foundation::ErrorKind::Programming));
    }

    #[test]
    fn test_report_status() {
        let ok = ProjectionReport { residual: 1e-12, tolerance: 1e-8 };
        assert!(ok.status().is_ok());
        let bad = ProjectionReport { residual: 1e-3, tolerance: 1e-8 };
        let err = bad.status().unwrap_err();
        assert!(!err.is_fatal());
    }
}
