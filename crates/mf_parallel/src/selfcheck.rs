// crates/mf_parallel/src/selfcheck.rs

//! 分解布局自检
//!
//! 用全局索引编码的测试场 `v = i + itot * (j + jtot * k)` 检查：
//!
//! 1. 子区域内部值与全局索引一致
//! 2. 晕区交换后各晕区（含周期回绕与角点）取到正确的邻居值
//! 3. `Z→X→Y→Z` 转置往返逐位相同，且 X/Y 铅笔中每个值都位于正确的全局位置

use mf_foundation::MfResult;
use ndarray::Array3;
use tracing::{debug, info};

use crate::comm::Communicator;
use crate::halo::HaloExchanger;
use crate::topology::{GlobalExtent, Subdomain, Topology};
use crate::transpose::{PencilBuffer, PencilMode, Transposer};

/// 自检结果（全局汇总）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutReport {
    /// 检查过的晕区网格数
    pub halo_checked: usize,
    /// 晕区错误数
    pub halo_errors: usize,
    /// 铅笔位置错误数
    pub pencil_errors: usize,
    /// 往返不一致数
    pub roundtrip_errors: usize,
}

impl LayoutReport {
    /// 是否全部通过
    pub fn is_ok(&self) -> bool {
        self.halo_errors == 0 && self.pencil_errors == 0 && self.roundtrip_errors == 0
    }
}

/// 布局自检
pub struct LayoutCheck<'a> {
    topo: &'a Topology,
    sub: &'a Subdomain,
    extent: GlobalExtent,
}

impl<'a> LayoutCheck<'a> {
    /// 创建
    pub fn new(topo: &'a Topology, sub: &'a Subdomain, extent: GlobalExtent) -> Self {
        Self { topo, sub, extent }
    }

    fn pattern(&self, i: usize, j: usize, k: usize) -> f64 {
        (i + self.extent.itot * (j + self.extent.jtot * k)) as f64
    }

    /// 局部 i 对应的全局 i；非周期边界之外返回 None
    fn global_i(&self, ii: usize) -> Option<usize> {
        wrap(self.sub.ioffset as isize + ii as isize - self.sub.igc as isize, self.extent.itot, self.topo.periodic_x())
    }

    fn global_j(&self, jj: usize) -> Option<usize> {
        wrap(self.sub.joffset as isize + jj as isize - self.sub.jgc as isize, self.extent.jtot, self.topo.periodic_y())
    }

    /// 执行自检，结果在全组归约
    pub fn run(&self, comm: &dyn Communicator, transposer: &Transposer) -> MfResult<LayoutReport> {
        let sub = self.sub;
        let (kc, jc, ic) = sub.shape();

        // 只填内部，晕区置为哨兵值
        let mut data = Array3::from_elem((kc, jc, ic), f64::NAN);
        for k in sub.kstart()..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    data[[k, j, i]] = self.pattern(
                        sub.ioffset + i - sub.igc,
                        sub.joffset + j - sub.jgc,
                        k - sub.kgc,
                    );
                }
            }
        }

        HaloExchanger::new(self.topo, sub).exchange(comm, &mut data)?;

        let mut halo_checked = 0usize;
        let mut halo_errors = 0usize;
        for k in sub.kstart()..sub.kend() {
            for jj in 0..jc {
                for ii in 0..ic {
                    let interior = (sub.jstart()..sub.jend()).contains(&jj)
                        && (sub.istart()..sub.iend()).contains(&ii);
                    if interior {
                        continue;
                    }
                    // 非周期域边界外的晕区不由交换填充
                    let (Some(gi), Some(gj)) = (self.global_i(ii), self.global_j(jj)) else {
                        continue;
                    };
                    halo_checked += 1;
                    if data[[k, jj, ii]] != self.pattern(gi, gj, k - sub.kgc) {
                        halo_errors += 1;
                    }
                }
            }
        }

        let native = transposer.from_field(sub, &data)?;
        let xbuf = transposer.transpose(comm, &native, PencilMode::XLocal)?;
        let ybuf = transposer.transpose(comm, &xbuf, PencilMode::YLocal)?;
        let back = transposer.transpose(comm, &ybuf, PencilMode::ZLocal)?;

        let pencil_errors = self.count_misplaced(&xbuf) + self.count_misplaced(&ybuf);
        let roundtrip_errors = native
            .data
            .iter()
            .zip(back.data.iter())
            .filter(|(a, b)| a.to_bits() != b.to_bits())
            .count();

        let totals = comm.all_reduce_sum_vec(&[
            halo_checked as f64,
            halo_errors as f64,
            pencil_errors as f64,
            roundtrip_errors as f64,
        ])?;
        let report = LayoutReport {
            halo_checked: totals[0] as usize,
            halo_errors: totals[1] as usize,
            pencil_errors: totals[2] as usize,
            roundtrip_errors: totals[3] as usize,
        };

        debug!(
            "进程 {}: 晕区错误 {}, 铅笔错误 {}, 往返错误 {}",
            comm.rank(),
            halo_errors,
            pencil_errors,
            roundtrip_errors
        );
        if comm.is_root() {
            info!(
                "布局自检: 检查晕区 {} 个, 晕区错误 {}, 铅笔错误 {}, 往返错误 {}",
                report.halo_checked, report.halo_errors, report.pencil_errors, report.roundtrip_errors
            );
        }
        Ok(report)
    }

    fn count_misplaced(&self, buf: &PencilBuffer) -> usize {
        let b = buf.block;
        buf.data
            .indexed_iter()
            .filter(|&((k, j, i), &v)| v != self.pattern(b.i0 + i, b.j0 + j, b.k0 + k))
            .count()
    }
}

fn wrap(g: isize, n: usize, periodic: bool) -> Option<usize> {
    let n = n as isize;
    if (0..n).contains(&g) {
        Some(g as usize)
    } else if periodic {
        Some(g.rem_euclid(n) as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(-1, 4, true), Some(3));
        assert_eq!(wrap(4, 4, true), Some(0));
        assert_eq!(wrap(-1, 4, false), None);
        assert_eq!(wrap(2, 4, false), Some(2));
    }
}
