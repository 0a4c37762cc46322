// crates/mf_parallel/src/halo.rs

//! 晕区交换
//!
//! 先沿 x 方向交换（仅内部 j 行），再沿 y 方向交换整个 i 范围，
//! 这样角点区域在第二步中由已填好的 x 晕区带过来。
//! 每一步先发出全部出站数据块，再接收入站数据块。
//! 非周期边界一侧没有邻居，留给边界条件处理。

use mf_foundation::{MfError, MfResult};
use ndarray::{s, Array3, ArrayView3, ArrayViewMut3};

use crate::comm::{tags, Communicator};
use crate::topology::{Subdomain, Topology};

/// 晕区交换器
#[derive(Debug, Clone)]
pub struct HaloExchanger {
    sub: Subdomain,
    west: Option<usize>,
    east: Option<usize>,
    south: Option<usize>,
    north: Option<usize>,
}

impl HaloExchanger {
    /// 由拓扑与子区域创建
    pub fn new(topo: &Topology, sub: &Subdomain) -> Self {
        Self {
            sub: *sub,
            west: topo.west(),
            east: topo.east(),
            south: topo.south(),
            north: topo.north(),
        }
    }

    /// 子区域
    pub fn subdomain(&self) -> &Subdomain {
        &self.sub
    }

    /// 交换一个场的水平晕区，只改写晕区网格
    pub fn exchange(&self, comm: &dyn Communicator, data: &mut Array3<f64>) -> MfResult<()> {
        let (kc, jc, ic) = self.sub.shape();
        if data.dim() != (kc, jc, ic) {
            return Err(MfError::protocol(format!(
                "晕区交换: 场形状 {:?} 与子区域形状 {:?} 不符",
                data.dim(),
                (kc, jc, ic)
            )));
        }
        self.exchange_x(comm, data)?;
        self.exchange_y(comm, data)
    }

    /// 依次交换多个场
    pub fn exchange_all(
        &self,
        comm: &dyn Communicator,
        fields: &mut [&mut Array3<f64>],
    ) -> MfResult<()> {
        for data in fields.iter_mut() {
            self.exchange(comm, data)?;
        }
        Ok(())
    }

    fn exchange_x(&self, comm: &dyn Communicator, data: &mut Array3<f64>) -> MfResult<()> {
        let sub = &self.sub;
        let (igc, istart, iend) = (sub.igc, sub.istart(), sub.iend());
        let (jstart, jend) = (sub.jstart(), sub.jend());

        // 东侧内部边缘发往东邻居，作为其西侧晕区
        if let Some(east) = self.east {
            let slab = pack(data.slice(s![.., jstart..jend, iend - igc..iend]));
            comm.send(east, tags::HALO_EAST, slab)?;
        }
        if let Some(west) = self.west {
            let slab = pack(data.slice(s![.., jstart..jend, istart..istart + igc]));
            comm.send(west, tags::HALO_WEST, slab)?;
        }

        if let Some(west) = self.west {
            let slab = comm.recv(west, tags::HALO_EAST)?;
            unpack(data.slice_mut(s![.., jstart..jend, 0..igc]), &slab, "x 方向西侧晕区")?;
        }
        if let Some(east) = self.east {
            let slab = comm.recv(east, tags::HALO_WEST)?;
            unpack(data.slice_mut(s![.., jstart..jend, iend..iend + igc]), &slab, "x 方向东侧晕区")?;
        }
        Ok(())
    }

    fn exchange_y(&self, comm: &dyn Communicator, data: &mut Array3<f64>) -> MfResult<()> {
        let sub = &self.sub;
        let (jgc, jstart, jend) = (sub.jgc, sub.jstart(), sub.jend());

        if let Some(north) = self.north {
            let slab = pack(data.slice(s![.., jend - jgc..jend, ..]));
            comm.send(north, tags::HALO_NORTH, slab)?;
        }
        if let Some(south) = self.south {
            let slab = pack(data.slice(s![.., jstart..jstart + jgc, ..]));
            comm.send(south, tags::HALO_SOUTH, slab)?;
        }

        if let Some(south) = self.south {
            let slab = comm.recv(south, tags::HALO_NORTH)?;
            unpack(data.slice_mut(s![.., 0..jgc, ..]), &slab, "y 方向南侧晕区")?;
        }
        if let Some(north) = self.north {
            let slab = comm.recv(north, tags::HALO_SOUTH)?;
            unpack(data.slice_mut(s![.., jend..jend + jgc, ..]), &slab, "y 方向北侧晕区")?;
        }
        Ok(())
    }
}

fn pack(view: ArrayView3<'_, f64>) -> Vec<f64> {
    view.iter().copied().collect()
}

fn unpack(mut view: ArrayViewMut3<'_, f64>, slab: &[f64], what: &str) -> MfResult<()> {
    MfError::check_len(what, view.len(), slab.len())?;
    for (dst, &src) in view.iter_mut().zip(slab) {
        *dst = src;
    }
    Ok(())
}
