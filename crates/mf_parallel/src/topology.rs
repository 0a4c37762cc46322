// crates/mf_parallel/src/topology.rs

//! 进程拓扑与网格分区
//!
//! 水平方向二维进程网格 `npx × npy`，进程编号 `rank = px + py * npx`。
//! 全局网格在 x、y 方向严格均分，z 方向不分解；不均分时直接报错，不做回退。

use mf_foundation::{MfError, MfResult};

/// 全局网格规模
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalExtent {
    /// x 方向网格数
    pub itot: usize,
    /// y 方向网格数
    pub jtot: usize,
    /// z 方向网格数
    pub ktot: usize,
}

impl GlobalExtent {
    /// 创建
    pub fn new(itot: usize, jtot: usize, ktot: usize) -> Self {
        Self { itot, jtot, ktot }
    }

    /// 水平网格总数
    pub fn horizontal_cells(&self) -> usize {
        self.itot * self.jtot
    }
}

/// 晕区宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaloWidth {
    /// x 方向
    pub igc: usize,
    /// y 方向
    pub jgc: usize,
    /// z 方向
    pub kgc: usize,
}

impl HaloWidth {
    /// 三个方向同宽
    pub fn uniform(width: usize) -> Self {
        Self {
            igc: width,
            jgc: width,
            kgc: width,
        }
    }
}

/// 进程拓扑（创建后不可变）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    rank: usize,
    size: usize,
    npx: usize,
    npy: usize,
    px: usize,
    py: usize,
    periodic_x: bool,
    periodic_y: bool,
}

impl Topology {
    /// 创建进程拓扑
    ///
    /// # 错误
    ///
    /// `npx * npy != size` 或 `rank >= size` 时返回配置错误。
    pub fn new(
        size: usize,
        rank: usize,
        npx: usize,
        npy: usize,
        periodic_x: bool,
        periodic_y: bool,
    ) -> MfResult<Self> {
        if npx == 0 || npy == 0 || npx * npy != size {
            return Err(MfError::config(format!(
                "进程网格 npx={npx} × npy={npy} 与进程总数 {size} 不符"
            )));
        }
        if rank >= size {
            return Err(MfError::config(format!("进程编号 {rank} 超出进程总数 {size}")));
        }
        Ok(Self {
            rank,
            size,
            npx,
            npy,
            px: rank % npx,
            py: rank / npx,
            periodic_x,
            periodic_y,
        })
    }

    /// 本进程编号
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// 进程总数
    pub fn size(&self) -> usize {
        self.size
    }

    /// x 方向进程数
    pub fn npx(&self) -> usize {
        self.npx
    }

    /// y 方向进程数
    pub fn npy(&self) -> usize {
        self.npy
    }

    /// 本进程坐标 `(px, py)`
    pub fn coord(&self) -> (usize, usize) {
        (self.px, self.py)
    }

    /// x 方向是否周期
    pub fn periodic_x(&self) -> bool {
        self.periodic_x
    }

    /// y 方向是否周期
    pub fn periodic_y(&self) -> bool {
        self.periodic_y
    }

    /// 坐标对应的进程编号
    pub fn rank_of(&self, px: usize, py: usize) -> usize {
        px + py * self.npx
    }

    /// 进程编号对应的坐标
    pub fn coord_of(&self, rank: usize) -> (usize, usize) {
        (rank % self.npx, rank / self.npx)
    }

    /// 西侧邻居
    pub fn west(&self) -> Option<usize> {
        Self::step_back(self.px, self.npx, self.periodic_x).map(|px| self.rank_of(px, self.py))
    }

    /// 东侧邻居
    pub fn east(&self) -> Option<usize> {
        Self::step_forward(self.px, self.npx, self.periodic_x).map(|px| self.rank_of(px, self.py))
    }

    /// 南侧邻居
    pub fn south(&self) -> Option<usize> {
        Self::step_back(self.py, self.npy, self.periodic_y).map(|py| self.rank_of(self.px, py))
    }

    /// 北侧邻居
    pub fn north(&self) -> Option<usize> {
        Self::step_forward(self.py, self.npy, self.periodic_y).map(|py| self.rank_of(self.px, py))
    }

    fn step_back(p: usize, n: usize, periodic: bool) -> Option<usize> {
        match (p, periodic) {
            (0, true) => Some(n - 1),
            (0, false) => None,
            _ => Some(p - 1),
        }
    }

    fn step_forward(p: usize, n: usize, periodic: bool) -> Option<usize> {
        if p + 1 < n {
            Some(p + 1)
        } else if periodic {
            Some(0)
        } else {
            None
        }
    }
}

/// 单个进程的子区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subdomain {
    /// x 方向内部网格数
    pub imax: usize,
    /// y 方向内部网格数
    pub jmax: usize,
    /// z 方向内部网格数
    pub kmax: usize,
    /// x 方向晕区宽度
    pub igc: usize,
    /// y 方向晕区宽度
    pub jgc: usize,
    /// z 方向虚拟层数
    pub kgc: usize,
    /// 内部首个网格的全局 i 索引
    pub ioffset: usize,
    /// 内部首个网格的全局 j 索引
    pub joffset: usize,
}

impl Subdomain {
    /// x 方向含晕区网格数
    pub fn icells(&self) -> usize {
        self.imax + 2 * self.igc
    }

    /// y 方向含晕区网格数
    pub fn jcells(&self) -> usize {
        self.jmax + 2 * self.jgc
    }

    /// z 方向含虚拟层网格数
    pub fn kcells(&self) -> usize {
        self.kmax + 2 * self.kgc
    }

    /// 存储形状 `[k, j, i]`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.kcells(), self.jcells(), self.icells())
    }

    /// 内部起始 i
    pub fn istart(&self) -> usize {
        self.igc
    }

    /// 内部结束 i（不含）
    pub fn iend(&self) -> usize {
        self.igc + self.imax
    }

    /// 内部起始 j
    pub fn jstart(&self) -> usize {
        self.jgc
    }

    /// 内部结束 j（不含）
    pub fn jend(&self) -> usize {
        self.jgc + self.jmax
    }

    /// 内部起始 k
    pub fn kstart(&self) -> usize {
        self.kgc
    }

    /// 内部结束 k（不含）
    pub fn kend(&self) -> usize {
        self.kgc + self.kmax
    }

    /// 内部网格总数
    pub fn interior_cells(&self) -> usize {
        self.imax * self.jmax * self.kmax
    }

    /// 全局 i 是否属于本子区域内部
    pub fn owns_i(&self, i: usize) -> bool {
        i >= self.ioffset && i < self.ioffset + self.imax
    }

    /// 全局 j 是否属于本子区域内部
    pub fn owns_j(&self, j: usize) -> bool {
        j >= self.joffset && j < self.joffset + self.jmax
    }
}

/// 计算本进程子区域
///
/// # 错误
///
/// - `itot % npx != 0` 或 `jtot % npy != 0` 时返回分区错误
/// - 子区域内部宽度小于晕区宽度时返回配置错误
pub fn partition(topo: &Topology, extent: GlobalExtent, halo: HaloWidth) -> MfResult<Subdomain> {
    subdomain_of(topo, topo.rank(), extent, halo)
}

/// 计算全部进程的子区域，按进程编号排列
pub fn partition_all(
    topo: &Topology,
    extent: GlobalExtent,
    halo: HaloWidth,
) -> MfResult<Vec<Subdomain>> {
    (0..topo.size())
        .map(|rank| subdomain_of(topo, rank, extent, halo))
        .collect()
}

fn subdomain_of(
    topo: &Topology,
    rank: usize,
    extent: GlobalExtent,
    halo: HaloWidth,
) -> MfResult<Subdomain> {
    if extent.itot % topo.npx() != 0 {
        return Err(MfError::partition("x", extent.itot, topo.npx()));
    }
    if extent.jtot % topo.npy() != 0 {
        return Err(MfError::partition("y", extent.jtot, topo.npy()));
    }
    let imax = extent.itot / topo.npx();
    let jmax = extent.jtot / topo.npy();
    if imax < halo.igc || jmax < halo.jgc || extent.ktot < halo.kgc {
        return Err(MfError::config(format!(
            "子区域内部 {imax}×{jmax}×{} 小于晕区宽度 {}×{}×{}",
            extent.ktot, halo.igc, halo.jgc, halo.kgc
        )));
    }

    let (px, py) = topo.coord_of(rank);
    Ok(Subdomain {
        imax,
        jmax,
        kmax: extent.ktot,
        igc: halo.igc,
        jgc: halo.jgc,
        kgc: halo.kgc,
        ioffset: px * imax,
        joffset: py * jmax,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_foundation::ErrorKind;

    #[test]
    fn test_size_mismatch() {
        let err = Topology::new(4, 0, 3, 1, true, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(Topology::new(4, 4, 2, 2, true, true).is_err());
    }

    #[test]
    fn test_rank_layout() {
        let topo = Topology::new(6, 4, 3, 2, true, true).unwrap();
        assert_eq!(topo.coord(), (1, 1));
        assert_eq!(topo.rank_of(1, 1), 4);
        assert_eq!(topo.west(), Some(3));
        assert_eq!(topo.east(), Some(5));
        assert_eq!(topo.south(), Some(1));
        assert_eq!(topo.north(), Some(1));
    }

    #[test]
    fn test_periodic_wrap() {
        let topo = Topology::new(6, 0, 3, 2, true, true).unwrap();
        assert_eq!(topo.west(), Some(2));
        assert_eq!(topo.south(), Some(3));

        let topo = Topology::new(6, 0, 3, 2, false, false).unwrap();
        assert_eq!(topo.west(), None);
        assert_eq!(topo.south(), None);
        assert_eq!(topo.east(), Some(1));
    }

    #[test]
    fn test_single_wide_axis_is_own_neighbor() {
        let topo = Topology::new(3, 1, 1, 3, true, true).unwrap();
        assert_eq!(topo.west(), Some(1));
        assert_eq!(topo.east(), Some(1));
        assert_eq!(topo.south(), Some(0));
        assert_eq!(topo.north(), Some(2));
    }

    #[test]
    fn test_partition_error() {
        let topo = Topology::new(3, 0, 3, 1, true, true).unwrap();
        let err = partition(&topo, GlobalExtent::new(10, 4, 2), HaloWidth::uniform(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Partition);
    }

    #[test]
    fn test_partition_offsets() {
        let topo = Topology::new(4, 3, 2, 2, true, true).unwrap();
        let sub = partition(&topo, GlobalExtent::new(8, 6, 4), HaloWidth::uniform(1)).unwrap();
        assert_eq!((sub.imax, sub.jmax, sub.kmax), (4, 3, 4));
        assert_eq!((sub.ioffset, sub.joffset), (4, 3));
        assert_eq!(sub.shape(), (6, 5, 6));
        assert!(sub.owns_i(7) && !sub.owns_i(3));
    }

    #[test]
    fn test_halo_wider_than_subdomain() {
        let topo = Topology::new(4, 0, 4, 1, true, true).unwrap();
        let result = partition(&topo, GlobalExtent::new(4, 4, 4), HaloWidth::uniform(2));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
    }
}
