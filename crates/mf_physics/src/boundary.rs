// crates/mf_physics/src/boundary.rs

//! 边界条件
//!
//! 1. 全部预报变量做水平晕区交换（周期方向由相邻进程填充）
//! 2. 非周期的水平区域边缘零梯度外推
//! 3. 垂直壁面：动量无滑移或自由滑移，标量 Dirichlet 或 Neumann，`w` 在壁面为零
//!
//! 垂直条件作用于包括晕区在内的全部水平网格，因此角点与水平交换结果一致。

use mf_config::{BoundarySection, MomentumBc, ScalarBc};
use mf_fields::{FieldStore, Grid, Placement};
use mf_foundation::MfResult;
use mf_parallel::{Communicator, HaloExchanger, Subdomain, Topology};
use ndarray::{s, Array3, Axis};

/// 边界条件
#[derive(Debug, Clone)]
pub struct Boundary {
    halo: HaloExchanger,
    cfg: BoundarySection,
    west_edge: bool,
    east_edge: bool,
    south_edge: bool,
    north_edge: bool,
}

impl Boundary {
    /// 由配置与拓扑创建
    pub fn new(cfg: &BoundarySection, topo: &Topology, grid: &Grid) -> Self {
        Self {
            halo: HaloExchanger::new(topo, &grid.sub),
            cfg: cfg.clone(),
            west_edge: topo.west().is_none(),
            east_edge: topo.east().is_none(),
            south_edge: topo.south().is_none(),
            north_edge: topo.north().is_none(),
        }
    }

    /// 更新全部预报变量的晕区与虚拟层
    pub fn apply(&self, comm: &dyn Communicator, grid: &Grid, fields: &mut FieldStore) -> MfResult<()> {
        let sub = grid.sub;
        let mut halos: Vec<&mut Array3<f64>> = fields.prog.iter_mut().map(|f| &mut f.data).collect();
        self.halo.exchange_all(comm, &mut halos)?;

        for field in &mut fields.prog {
            self.fill_open_edges(&sub, &mut field.data);
            match field.placement {
                Placement::FaceX | Placement::FaceY => {
                    momentum_bottom(&sub, &mut field.data, self.cfg.mbcbot);
                    momentum_top(&sub, &mut field.data, self.cfg.mbctop);
                }
                Placement::FaceZ => vertical_velocity(&sub, &mut field.data),
                Placement::Center => {
                    scalar_bottom(&sub, grid, &mut field.data, self.cfg.sbcbot, self.cfg.sbot);
                    scalar_top(&sub, grid, &mut field.data, self.cfg.sbctop, self.cfg.stop);
                }
            }
        }
        Ok(())
    }

    /// 非周期的区域边缘：晕区复制最近的内部值
    pub(crate) fn fill_open_edges(&self, sub: &Subdomain, data: &mut Array3<f64>) {
        let (is, ie, js, je) = (sub.istart(), sub.iend(), sub.jstart(), sub.jend());
        let (_, jc, ic) = sub.shape();
        if self.west_edge {
            let edge = data.slice(s![.., .., is..is + 1]).to_owned();
            for i in 0..is {
                data.slice_mut(s![.., .., i..i + 1]).assign(&edge);
            }
        }
        if self.east_edge {
            let edge = data.slice(s![.., .., ie - 1..ie]).to_owned();
            for i in ie..ic {
                data.slice_mut(s![.., .., i..i + 1]).assign(&edge);
            }
        }
        if self.south_edge {
            let edge = data.slice(s![.., js..js + 1, ..]).to_owned();
            for j in 0..js {
                data.slice_mut(s![.., j..j + 1, ..]).assign(&edge);
            }
        }
        if self.north_edge {
            let edge = data.slice(s![.., je - 1..je, ..]).to_owned();
            for j in je..jc {
                data.slice_mut(s![.., j..j + 1, ..]).assign(&edge);
            }
        }
    }
}

fn mirror(data: &mut Array3<f64>, ghost: usize, source: usize, f: impl Fn(f64) -> f64) {
    let (src, mut dst) = data.multi_slice_mut((s![source, .., ..], s![ghost, .., ..]));
    dst.zip_mut_with(&src, |d, &v| *d = f(v));
}

fn momentum_bottom(sub: &Subdomain, data: &mut Array3<f64>, bc: MomentumBc) {
    let ks = sub.kstart();
    for n in 0..sub.kgc {
        match bc {
            MomentumBc::NoSlip => mirror(data, ks - 1 - n, ks + n, |v| -v),
            MomentumBc::FreeSlip => mirror(data, ks - 1 - n, ks + n, |v| v),
        }
    }
}

fn momentum_top(sub: &Subdomain, data: &mut Array3<f64>, bc: MomentumBc) {
    let ke = sub.kend();
    for n in 0..sub.kgc {
        match bc {
            MomentumBc::NoSlip => mirror(data, ke + n, ke - 1 - n, |v| -v),
            MomentumBc::FreeSlip => mirror(data, ke + n, ke - 1 - n, |v| v),
        }
    }
}

fn vertical_velocity(sub: &Subdomain, data: &mut Array3<f64>) {
    let (ks, ke) = (sub.kstart(), sub.kend());
    data.index_axis_mut(Axis(0), ks).fill(0.0);
    data.index_axis_mut(Axis(0), ke).fill(0.0);
    for n in 1..=sub.kgc {
        mirror(data, ks - n, ks + n, |v| -v);
        if ke + n < data.dim().0 {
            mirror(data, ke + n, ke - n, |v| -v);
        }
    }
}

fn scalar_bottom(sub: &Subdomain, grid: &Grid, data: &mut Array3<f64>, bc: ScalarBc, value: f64) {
    let ks = sub.kstart();
    for n in 0..sub.kgc {
        let (ghost, inner) = (ks - 1 - n, ks + n);
        match bc {
            ScalarBc::Dirichlet => mirror(data, ghost, inner, |v| 2.0 * value - v),
            ScalarBc::Neumann => {
                let dz = grid.z[inner] - grid.z[ghost];
                mirror(data, ghost, inner, |v| v - value * dz);
            }
        }
    }
}

fn scalar_top(sub: &Subdomain, grid: &Grid, data: &mut Array3<f64>, bc: ScalarBc, value: f64) {
    let ke = sub.kend();
    for n in 0..sub.kgc {
        let (ghost, inner) = (ke + n, ke - 1 - n);
        match bc {
            ScalarBc::Dirichlet => mirror(data, ghost, inner, |v| 2.0 * value - v),
            ScalarBc::Neumann => {
                let dz = grid.z[ghost] - grid.z[inner];
                mirror(data, ghost, inner, |v| v + value * dz);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_config::FieldsSection;
    use mf_fields::{FIRST_SCALAR, U, W};
    use mf_parallel::{partition, GlobalExtent, HaloWidth, ThreadWorld};

    fn run_boundary(cfg: BoundarySection, periodic: bool) -> (Grid, FieldStore) {
        let out = ThreadWorld::run(1, |comm| {
            let topo = Topology::new(1, 0, 1, 1, periodic, periodic)?;
            let extent = GlobalExtent::new(4, 3, 4);
            let sub = partition(&topo, extent, HaloWidth::uniform(1))?;
            let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], None)?;
            let fcfg = FieldsSection {
                scalars: vec!["s".into()],
                ..Default::default()
            };
            let mut fields = FieldStore::new(&fcfg, &grid);
            for field in &mut fields.prog {
                let values: Vec<f64> = (0..sub.interior_cells()).map(|c| 1.0 + c as f64).collect();
                field.set_interior(&sub, &values)?;
            }
            Boundary::new(&cfg, &topo, &grid).apply(comm, &grid, &mut fields)?;
            Ok((grid, fields))
        })
        .unwrap();
        out.into_iter().next().unwrap()
    }

    #[test]
    fn test_wall_conditions() {
        let cfg = BoundarySection {
            mbcbot: MomentumBc::NoSlip,
            mbctop: MomentumBc::FreeSlip,
            sbcbot: ScalarBc::Dirichlet,
            sbctop: ScalarBc::Neumann,
            sbot: 2.0,
            stop: 0.5,
        };
        let (grid, fields) = run_boundary(cfg, true);
        let sub = grid.sub;
        let (ks, ke, j, i) = (sub.kstart(), sub.kend(), sub.jstart(), sub.istart() + 1);

        let u = &fields.prog[U].data;
        assert_eq!(u[[ks - 1, j, i]], -u[[ks, j, i]]);
        assert_eq!(u[[ke, j, i]], u[[ke - 1, j, i]]);

        let w = &fields.prog[W].data;
        assert_eq!(w[[ks, j, i]], 0.0);
        assert_eq!(w[[ke, j, i]], 0.0);
        assert_eq!(w[[ks - 1, j, i]], -w[[ks + 1, j, i]]);

        let s = &fields.prog[FIRST_SCALAR].data;
        assert!((0.5 * (s[[ks - 1, j, i]] + s[[ks, j, i]]) - 2.0).abs() < 1e-12);
        let grad = (s[[ke, j, i]] - s[[ke - 1, j, i]]) * grid.dzhi[ke];
        assert!((grad - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_and_open_edges() {
        let (grid, fields) = run_boundary(BoundarySection::default(), true);
        let sub = grid.sub;
        let s = &fields.prog[FIRST_SCALAR].data;
        let k = sub.kstart();
        assert_eq!(s[[k, sub.jstart(), 0]], s[[k, sub.jstart(), sub.iend() - 1]]);

        let (grid, fields) = run_boundary(BoundarySection::default(), false);
        let sub = grid.sub;
        let s = &fields.prog[FIRST_SCALAR].data;
        assert_eq!(s[[k, sub.jstart(), 0]], s[[k, sub.jstart(), sub.istart()]]);
        assert_eq!(s[[k, sub.jend(), sub.iend()]], s[[k, sub.jend() - 1, sub.iend() - 1]]);
    }
}
