// crates/mf_parallel/src/transpose.rs

//! 铅笔分解转置
//!
//! 三种分解模式：
//!
//! | 模式 | i | j | k |
//! |------|---|---|---|
//! | `ZLocal` | 原生子区域 | 原生子区域 | 全部 |
//! | `XLocal` | 全部 | 按 npy 分给 py | 按 npx 分给 px |
//! | `YLocal` | 按 npy 分给 py | 全部 | 按 npx 分给 px |
//!
//! 铅笔块采用均衡切分（前 `n % parts` 份多一个），因此任意网格规模都可转置。
//! 转置是一次变长全交换：每个进程把自己的源块与各进程目标块的交集发给对方。
//! 由于交换只依赖两个模式的块划分，任意两种模式之间都可直接转置，
//! `X→Y→Z` 与 `X→Z` 结果相同；转置只搬运数值，往返严格逐位相同。

use mf_foundation::{MfError, MfResult};
use ndarray::{s, Array3};

use crate::comm::Communicator;
use crate::topology::{GlobalExtent, Subdomain, Topology};

/// 分解模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PencilMode {
    /// x 方向完整
    XLocal,
    /// y 方向完整
    YLocal,
    /// z 方向完整（原生分解）
    ZLocal,
}

/// 全局索引空间中的长方体块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// 起始 i
    pub i0: usize,
    /// i 方向长度
    pub ni: usize,
    /// 起始 j
    pub j0: usize,
    /// j 方向长度
    pub nj: usize,
    /// 起始 k
    pub k0: usize,
    /// k 方向长度
    pub nk: usize,
}

impl Block {
    /// 数值个数
    pub fn len(&self) -> usize {
        self.ni * self.nj * self.nk
    }

    /// 是否为空块
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 存储形状 `[k, j, i]`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nk, self.nj, self.ni)
    }

    /// 两块交集
    pub fn intersect(&self, other: &Block) -> Option<Block> {
        let (i0, ni) = overlap(self.i0, self.ni, other.i0, other.ni)?;
        let (j0, nj) = overlap(self.j0, self.nj, other.j0, other.nj)?;
        let (k0, nk) = overlap(self.k0, self.nk, other.k0, other.nk)?;
        Some(Block { i0, ni, j0, nj, k0, nk })
    }

    /// 本块内的局部切片范围
    fn local_ranges(&self, inner: &Block) -> [std::ops::Range<usize>; 3] {
        let k = inner.k0 - self.k0;
        let j = inner.j0 - self.j0;
        let i = inner.i0 - self.i0;
        [k..k + inner.nk, j..j + inner.nj, i..i + inner.ni]
    }
}

fn overlap(a0: usize, na: usize, b0: usize, nb: usize) -> Option<(usize, usize)> {
    let lo = a0.max(b0);
    let hi = (a0 + na).min(b0 + nb);
    (hi > lo).then(|| (lo, hi - lo))
}

/// 均衡切分：返回第 `idx` 份的起点与长度
pub fn balanced_split(n: usize, parts: usize, idx: usize) -> (usize, usize) {
    let base = n / parts;
    let rem = n % parts;
    let len = base + usize::from(idx < rem);
    let start = idx * base + idx.min(rem);
    (start, len)
}

/// 某一分解模式下的本地数据
#[derive(Debug, Clone)]
pub struct PencilBuffer {
    /// 分解模式
    pub mode: PencilMode,
    /// 本地块
    pub block: Block,
    /// 数据 `[k, j, i]`
    pub data: Array3<f64>,
}

/// 转置器
#[derive(Debug, Clone)]
pub struct Transposer {
    rank: usize,
    extent: GlobalExtent,
    x_blocks: Vec<Block>,
    y_blocks: Vec<Block>,
    z_blocks: Vec<Block>,
}

impl Transposer {
    /// 由拓扑和全部子区域建立各模式的块划分
    pub fn new(topo: &Topology, extent: GlobalExtent, subdomains: &[Subdomain]) -> MfResult<Self> {
        MfError::check_len("转置器子区域数", topo.size(), subdomains.len())?;
        let (npx, npy) = (topo.npx(), topo.npy());

        let mut x_blocks = Vec::with_capacity(topo.size());
        let mut y_blocks = Vec::with_capacity(topo.size());
        let mut z_blocks = Vec::with_capacity(topo.size());
        for (rank, sub) in subdomains.iter().enumerate() {
            let (px, py) = topo.coord_of(rank);
            let (k0, nk) = balanced_split(extent.ktot, npx, px);

            let (j0, nj) = balanced_split(extent.jtot, npy, py);
            x_blocks.push(Block { i0: 0, ni: extent.itot, j0, nj, k0, nk });

            let (i0, ni) = balanced_split(extent.itot, npy, py);
            y_blocks.push(Block { i0, ni, j0: 0, nj: extent.jtot, k0, nk });

            z_blocks.push(Block {
                i0: sub.ioffset,
                ni: sub.imax,
                j0: sub.joffset,
                nj: sub.jmax,
                k0: 0,
                nk: sub.kmax,
            });
        }

        Ok(Self {
            rank: topo.rank(),
            extent,
            x_blocks,
            y_blocks,
            z_blocks,
        })
    }

    /// 全局规模
    pub fn extent(&self) -> GlobalExtent {
        self.extent
    }

    /// 指定进程在指定模式下的块
    pub fn block(&self, mode: PencilMode, rank: usize) -> Block {
        match mode {
            PencilMode::XLocal => self.x_blocks[rank],
            PencilMode::YLocal => self.y_blocks[rank],
            PencilMode::ZLocal => self.z_blocks[rank],
        }
    }

    /// 本进程在指定模式下的块
    pub fn local_block(&self, mode: PencilMode) -> Block {
        self.block(mode, self.rank)
    }

    /// 全零缓冲
    pub fn zeros(&self, mode: PencilMode) -> PencilBuffer {
        let block = self.local_block(mode);
        PencilBuffer {
            mode,
            block,
            data: Array3::zeros(block.shape()),
        }
    }

    /// 从含晕区的场中复制内部数据，得到 `ZLocal` 缓冲
    pub fn from_field(&self, sub: &Subdomain, field: &Array3<f64>) -> MfResult<PencilBuffer> {
        if field.dim() != sub.shape() {
            return Err(MfError::protocol(format!(
                "场形状 {:?} 与子区域形状 {:?} 不符",
                field.dim(),
                sub.shape()
            )));
        }
        let block = self.local_block(PencilMode::ZLocal);
        let interior = field.slice(s![sub.kstart()..sub.kend(), sub.jstart()..sub.jend(), sub.istart()..sub.iend()]);
        Ok(PencilBuffer {
            mode: PencilMode::ZLocal,
            block,
            data: interior.to_owned(),
        })
    }

    /// 把 `ZLocal` 缓冲写回场的内部区域
    pub fn to_field(&self, buf: &PencilBuffer, sub: &Subdomain, field: &mut Array3<f64>) -> MfResult<()> {
        if buf.mode != PencilMode::ZLocal {
            return Err(MfError::programming(format!("只能从 ZLocal 写回场, 实际为 {:?}", buf.mode)));
        }
        if field.dim() != sub.shape() || buf.data.dim() != (sub.kmax, sub.jmax, sub.imax) {
            return Err(MfError::protocol("写回场时形状不符"));
        }
        field
            .slice_mut(s![sub.kstart()..sub.kend(), sub.jstart()..sub.jend(), sub.istart()..sub.iend()])
            .assign(&buf.data);
        Ok(())
    }

    /// 把缓冲转置到目标模式
    pub fn transpose(
        &self,
        comm: &dyn Communicator,
        buf: &PencilBuffer,
        to: PencilMode,
    ) -> MfResult<PencilBuffer> {
        let src = self.local_block(buf.mode);
        if buf.block != src || buf.data.dim() != src.shape() {
            return Err(MfError::protocol(format!(
                "转置源缓冲与 {:?} 块不符: 块 {:?}, 形状 {:?}",
                buf.mode,
                buf.block,
                buf.data.dim()
            )));
        }
        if buf.mode == to {
            return Ok(buf.clone());
        }

        let size = comm.size();
        let outgoing = (0..size)
            .map(|dest| match src.intersect(&self.block(to, dest)) {
                Some(inter) => {
                    let [k, j, i] = src.local_ranges(&inter);
                    buf.data.slice(s![k, j, i]).iter().copied().collect()
                }
                None => Vec::new(),
            })
            .collect();

        let incoming = comm.all_to_all_v(outgoing)?;

        let mut out = self.zeros(to);
        let dst = out.block;
        for (source, piece) in incoming.iter().enumerate() {
            let inter = self.block(buf.mode, source).intersect(&dst);
            let expected = inter.map_or(0, |b| b.len());
            MfError::check_len(&format!("转置 {:?}→{:?} (来自进程 {source})", buf.mode, to), expected, piece.len())?;
            if let Some(inter) = inter {
                let [k, j, i] = dst.local_ranges(&inter);
                for (d, &v) in out.data.slice_mut(s![k, j, i]).iter_mut().zip(piece) {
                    *d = v;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_split() {
        assert_eq!(balanced_split(4, 3, 0), (0, 2));
        assert_eq!(balanced_split(4, 3, 1), (2, 1));
        assert_eq!(balanced_split(4, 3, 2), (3, 1));
        assert_eq!(balanced_split(2, 4, 3), (2, 0));
    }

    #[test]
    fn test_intersect() {
        let a = Block { i0: 0, ni: 4, j0: 0, nj: 2, k0: 0, nk: 2 };
        let b = Block { i0: 2, ni: 4, j0: 1, nj: 2, k0: 0, nk: 1 };
        let c = a.intersect(&b).unwrap();
        assert_eq!(c, Block { i0: 2, ni: 2, j0: 1, nj: 1, k0: 0, nk: 1 });

        let far = Block { i0: 10, ni: 1, ..b };
        assert!(a.intersect(&far).is_none());
    }
}
