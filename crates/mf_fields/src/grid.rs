// crates/mf_fields/src/grid.rs

//! 交错网格几何
//!
//! 水平方向等距；垂直方向可由单元中心高度列表给出非均匀网格。
//! 速度分量位于各自方向的面上（`u` 在 `xh`、`v` 在 `yh`、`w` 在 `zh`），标量与压力位于单元中心。
//!
//! 垂直数组按含虚拟层的局部索引存储：`z`、`dz`、`dzi` 长度为 `kcells`，
//! `zh`、`dzh`、`dzhi` 长度为 `kcells + 1`。虚拟层相对壁面镜像。

use mf_config::GridSection;
use mf_foundation::{MfError, MfResult};
use mf_parallel::{partition, GlobalExtent, HaloWidth, Subdomain, Topology};

/// 网格几何
#[derive(Debug, Clone)]
pub struct Grid {
    /// 全局规模
    pub extent: GlobalExtent,
    /// 本进程子区域
    pub sub: Subdomain,

    /// x 方向区域长度
    pub xsize: f64,
    /// y 方向区域长度
    pub ysize: f64,
    /// z 方向区域高度
    pub zsize: f64,

    /// x 方向网格间距
    pub dx: f64,
    /// y 方向网格间距
    pub dy: f64,
    /// 1/dx
    pub dxi: f64,
    /// 1/dy
    pub dyi: f64,

    /// 局部单元中心 x
    pub x: Vec<f64>,
    /// 局部面 x
    pub xh: Vec<f64>,
    /// 局部单元中心 y
    pub y: Vec<f64>,
    /// 局部面 y
    pub yh: Vec<f64>,

    /// 单元中心高度
    pub z: Vec<f64>,
    /// 面高度
    pub zh: Vec<f64>,
    /// 单元厚度
    pub dz: Vec<f64>,
    /// 1/dz
    pub dzi: Vec<f64>,
    /// 相邻中心间距
    pub dzh: Vec<f64>,
    /// 1/dzh
    pub dzhi: Vec<f64>,
}

impl Grid {
    /// 由网格配置与拓扑创建
    pub fn new(cfg: &GridSection, topo: &Topology) -> MfResult<Self> {
        let extent = GlobalExtent::new(cfg.itot, cfg.jtot, cfg.ktot);
        let halo = HaloWidth {
            igc: cfg.igc,
            jgc: cfg.jgc,
            kgc: cfg.kgc,
        };
        let sub = partition(topo, extent, halo)?;
        Self::from_parts(extent, sub, [cfg.xsize, cfg.ysize, cfg.zsize], cfg.z.as_deref())
    }

    /// 由已分区的子区域创建
    pub fn from_parts(
        extent: GlobalExtent,
        sub: Subdomain,
        sizes: [f64; 3],
        zlist: Option<&[f64]>,
    ) -> MfResult<Self> {
        let [xsize, ysize, zsize] = sizes;
        let dx = xsize / extent.itot as f64;
        let dy = ysize / extent.jtot as f64;

        let x = (0..sub.icells())
            .map(|i| (global_index(sub.ioffset, i, sub.igc) + 0.5) * dx)
            .collect();
        let xh = (0..sub.icells())
            .map(|i| global_index(sub.ioffset, i, sub.igc) * dx)
            .collect();
        let y = (0..sub.jcells())
            .map(|j| (global_index(sub.joffset, j, sub.jgc) + 0.5) * dy)
            .collect();
        let yh = (0..sub.jcells())
            .map(|j| global_index(sub.joffset, j, sub.jgc) * dy)
            .collect();

        let (z, zh) = vertical_levels(&sub, zsize, zlist)?;
        let kc = sub.kcells();

        let dz: Vec<f64> = (0..kc).map(|k| zh[k + 1] - zh[k]).collect();
        let mut dzh = vec![0.0; kc + 1];
        for k in 1..kc {
            dzh[k] = z[k] - z[k - 1];
        }
        dzh[0] = dzh[1];
        dzh[kc] = dzh[kc - 1];

        let dzi = dz.iter().map(|d| 1.0 / d).collect();
        let dzhi = dzh.iter().map(|d| 1.0 / d).collect();

        Ok(Self {
            extent,
            sub,
            xsize,
            ysize,
            zsize,
            dx,
            dy,
            dxi: 1.0 / dx,
            dyi: 1.0 / dy,
            x,
            xh,
            y,
            yh,
            z,
            zh,
            dz,
            dzi,
            dzh,
            dzhi,
        })
    }

    /// 内部全层高度
    pub fn interior_z(&self) -> &[f64] {
        &self.z[self.sub.kstart()..self.sub.kend()]
    }

    /// 内部半层高度（含上下壁面）
    pub fn interior_zh(&self) -> &[f64] {
        &self.zh[self.sub.kstart()..=self.sub.kend()]
    }

    /// 全局水平网格数
    pub fn horizontal_cells(&self) -> f64 {
        self.extent.horizontal_cells() as f64
    }

    /// 全部内部单元中最大的 1/dz
    pub fn max_dzi(&self) -> f64 {
        self.dzi[self.sub.kstart()..self.sub.kend()]
            .iter()
            .fold(0.0, |m, &v| f64::max(m, v))
    }
}

fn global_index(offset: usize, local: usize, gc: usize) -> f64 {
    offset as f64 + local as f64 - gc as f64
}

fn vertical_levels(sub: &Subdomain, zsize: f64, zlist: Option<&[f64]>) -> MfResult<(Vec<f64>, Vec<f64>)> {
    let (kc, ks, ke, kgc) = (sub.kcells(), sub.kstart(), sub.kend(), sub.kgc);
    let ktot = sub.kmax;

    let mut z = vec![0.0; kc];
    match zlist {
        Some(levels) => {
            if levels.len() != ktot {
                return Err(MfError::config(format!(
                    "grid.z 需要 {ktot} 个高度, 实际 {}",
                    levels.len()
                )));
            }
            z[ks..ke].copy_from_slice(levels);
        }
        None => {
            let dz = zsize / ktot as f64;
            for k in 0..ktot {
                z[ks + k] = (k as f64 + 0.5) * dz;
            }
        }
    }

    let mut zh = vec![0.0; kc + 1];
    zh[ks] = 0.0;
    for k in ks + 1..ke {
        zh[k] = 0.5 * (z[k - 1] + z[k]);
    }
    zh[ke] = zsize;

    for n in 0..kgc {
        z[ks - 1 - n] = -z[ks + n];
        z[ke + n] = 2.0 * zsize - z[ke - 1 - n];
    }
    for n in 1..=kgc {
        zh[ks - n] = -zh[ks + n];
        zh[ke + n] = 2.0 * zsize - zh[ke - n];
    }

    for k in ks..ke {
        if !(zh[k] < z[k] && z[k] < zh[k + 1]) {
            return Err(MfError::config(format!(
                "垂直网格第 {} 层中心 {} 不在面 [{}, {}] 之间",
                k - ks,
                z[k],
                zh[k],
                zh[k + 1]
            )));
        }
    }
    Ok((z, zh))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_rank(itot: usize, jtot: usize, ktot: usize, kgc: usize) -> (GlobalExtent, Subdomain) {
        let topo = Topology::new(1, 0, 1, 1, true, true).unwrap();
        let extent = GlobalExtent::new(itot, jtot, ktot);
        let halo = HaloWidth { igc: 1, jgc: 1, kgc };
        (extent, partition(&topo, extent, halo).unwrap())
    }

    #[test]
    fn test_uniform_grid() {
        let (extent, sub) = single_rank(4, 2, 4, 1);
        let grid = Grid::from_parts(extent, sub, [2.0, 1.0, 1.0], None).unwrap();
        assert_eq!(grid.dx, 0.5);
        assert!((grid.x[1] - 0.25).abs() < 1e-15);
        assert!((grid.xh[0] + 0.5).abs() < 1e-15);
        assert_eq!(grid.interior_z().len(), 4);
        assert_eq!(grid.interior_zh(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        for k in sub.kstart()..sub.kend() {
            assert!((grid.dz[k] - 0.25).abs() < 1e-14);
        }
        assert!((grid.dzh[sub.kstart()] - 0.25).abs() < 1e-14);
    }

    #[test]
    fn test_stretched_grid_mirrors_ghosts() {
        let (extent, sub) = single_rank(2, 2, 3, 2);
        let levels = [0.1, 0.3, 0.7];
        let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], Some(&levels)).unwrap();
        let ks = sub.kstart();
        let ke = sub.kend();

        assert!((grid.zh[ks + 1] - 0.2).abs() < 1e-14);
        assert!((grid.zh[ks + 2] - 0.5).abs() < 1e-14);
        assert!((grid.z[ks - 1] + 0.1).abs() < 1e-14);
        assert!((grid.z[ke] - 1.3).abs() < 1e-14);
        assert!((grid.dz[ks] - 0.2).abs() < 1e-14);
        assert!((grid.dzh[ks] - 0.2).abs() < 1e-14);
        assert!((grid.max_dzi() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_inconsistent_levels_rejected() {
        let (extent, sub) = single_rank(2, 2, 3, 1);
        // 最高的中心超出区域顶部
        let levels = [0.1, 0.3, 1.2];
        assert!(Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], Some(&levels)).is_err());
    }
}
