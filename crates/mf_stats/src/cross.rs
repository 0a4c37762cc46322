// crates/mf_stats/src/cross.rs

//! 二维截面
//!
//! 每个配置的 (方向, 索引, 变量) 组合写出一个独立文件，格式同场快照。
//! 各进程把自己拥有的那一片发给根进程，不拥有该截面的进程发送空片；
//! 根进程按子区域偏移拼成全局二维数组。截面不累积，每次调用独立。

use mf_config::CrossSection;
use mf_fields::{FieldStore, Grid};
use mf_foundation::{MfError, MfResult};
use mf_io::paths::cross_path;
use mf_io::{write_field, FieldHeader};
use mf_parallel::{partition_all, Communicator, HaloWidth, Subdomain, Topology};
use ndarray::{s, Array2};
use tracing::debug;

/// 截面方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// 固定 k 的水平面
    Xy,
    /// 固定 j 的垂直面
    Xz,
    /// 固定 i 的垂直面
    Yz,
}

impl Orientation {
    /// 文件名中的方向标记
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Xy => "xy",
            Orientation::Xz => "xz",
            Orientation::Yz => "yz",
        }
    }
}

/// 截面输出器
pub struct Cross {
    variables: Vec<String>,
    slices: Vec<(Orientation, usize)>,
    subdomains: Vec<Subdomain>,
}

impl Cross {
    /// 校验截面配置并记录全部子区域
    pub fn new(cfg: &CrossSection, topo: &Topology, grid: &Grid, fields: &FieldStore) -> MfResult<Self> {
        let extent = grid.extent;
        for name in &cfg.variables {
            if fields.get(name).is_none() {
                return Err(MfError::config(format!("cross.variables: 未知变量 '{name}'")));
            }
        }

        let mut slices = Vec::new();
        let axes = [
            (Orientation::Xy, &cfg.xy, extent.ktot),
            (Orientation::Xz, &cfg.xz, extent.jtot),
            (Orientation::Yz, &cfg.yz, extent.itot),
        ];
        for (orientation, indices, n) in axes {
            for &index in indices {
                if index >= n {
                    return Err(MfError::config(format!(
                        "cross.{}: 索引 {index} 超出范围 0..{n}",
                        orientation.as_str()
                    )));
                }
                slices.push((orientation, index));
            }
        }

        let halo = HaloWidth {
            igc: grid.sub.igc,
            jgc: grid.sub.jgc,
            kgc: grid.sub.kgc,
        };
        Ok(Self {
            variables: cfg.variables.clone(),
            slices,
            subdomains: partition_all(topo, extent, halo)?,
        })
    }

    /// 是否有截面要写
    pub fn is_active(&self) -> bool {
        !self.variables.is_empty() && !self.slices.is_empty()
    }

    /// 写出全部截面，所有进程必须同时调用
    pub fn exec(&self, comm: &dyn Communicator, grid: &Grid, fields: &FieldStore, iteration: u64) -> MfResult<()> {
        for name in &self.variables {
            let field = fields
                .get(name)
                .ok_or_else(|| MfError::programming(format!("截面变量 '{name}' 不存在")))?;
            for &(orientation, index) in &self.slices {
                let piece = local_piece(&field.data, &grid.sub, orientation, index);
                if let Some(pieces) = comm.gather(piece)? {
                    let slab = self.assemble(grid, orientation, index, &pieces)?;
                    let header = slab_header(grid, orientation, index, iteration);
                    let path = cross_path(fields.datadir(), name, orientation.as_str(), index, iteration);
                    write_field(&path, &header, &slab.into_raw_vec())?;
                }
            }
        }
        debug!("迭代步 {iteration} 写出 {} 个截面", self.variables.len() * self.slices.len());
        Ok(())
    }

    /// 根进程按偏移拼接
    fn assemble(&self, grid: &Grid, orientation: Orientation, index: usize, pieces: &[Vec<f64>]) -> MfResult<Array2<f64>> {
        let e = grid.extent;
        let mut slab = match orientation {
            Orientation::Xy => Array2::zeros((e.jtot, e.itot)),
            Orientation::Xz => Array2::zeros((e.ktot, e.itot)),
            Orientation::Yz => Array2::zeros((e.ktot, e.jtot)),
        };
        for (rank, (sub, piece)) in self.subdomains.iter().zip(pieces).enumerate() {
            let (rows, cols, origin, owns) = match orientation {
                Orientation::Xy => (sub.jmax, sub.imax, (sub.joffset, sub.ioffset), true),
                Orientation::Xz => (sub.kmax, sub.imax, (0, sub.ioffset), sub.owns_j(index)),
                Orientation::Yz => (sub.kmax, sub.jmax, (0, sub.joffset), sub.owns_i(index)),
            };
            let expected = if owns { rows * cols } else { 0 };
            MfError::check_len(&format!("截面 {} (来自进程 {rank})", orientation.as_str()), expected, piece.len())?;
            if owns {
                let (r0, c0) = origin;
                let mut target = slab.slice_mut(s![r0..r0 + rows, c0..c0 + cols]);
                for (dst, &v) in target.iter_mut().zip(piece) {
                    *dst = v;
                }
            }
        }
        Ok(slab)
    }
}

/// 本进程拥有的截面片段，行优先
fn local_piece(data: &ndarray::Array3<f64>, sub: &Subdomain, orientation: Orientation, index: usize) -> Vec<f64> {
    let (is, ie, js, je, ks, ke) = (sub.istart(), sub.iend(), sub.jstart(), sub.jend(), sub.kstart(), sub.kend());
    match orientation {
        Orientation::Xy => data.slice(s![ks + index, js..je, is..ie]).iter().copied().collect(),
        Orientation::Xz if sub.owns_j(index) => {
            let j = js + index - sub.joffset;
            data.slice(s![ks..ke, j, is..ie]).iter().copied().collect()
        }
        Orientation::Yz if sub.owns_i(index) => {
            let i = is + index - sub.ioffset;
            data.slice(s![ks..ke, js..je, i]).iter().copied().collect()
        }
        _ => Vec::new(),
    }
}

fn slab_header(grid: &Grid, orientation: Orientation, index: usize, iteration: u64) -> FieldHeader {
    let e = grid.extent;
    let (nx, ny, nz, ioffset, joffset, koffset) = match orientation {
        Orientation::Xy => (e.itot, e.jtot, 1, 0, 0, index),
        Orientation::Xz => (e.itot, 1, e.ktot, 0, index, 0),
        Orientation::Yz => (1, e.jtot, e.ktot, index, 0, 0),
    };
    FieldHeader {
        iteration,
        nx,
        ny,
        nz,
        ioffset,
        joffset,
        koffset,
    }
}
