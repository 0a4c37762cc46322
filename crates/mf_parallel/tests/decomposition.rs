// crates/mf_parallel/tests/decomposition.rs

//! 分解层多进程测试
//!
//! 覆盖分区铺满、晕区交换幂等、转置往返与组合等价。

use mf_foundation::MfResult;
use mf_parallel::{
    partition, partition_all, Communicator, GlobalExtent, HaloExchanger, HaloWidth, LayoutCheck,
    PencilMode, ThreadComm, ThreadWorld, Topology, Transposer,
};
use ndarray::{s, Array3};

struct Setup {
    topo: Topology,
    extent: GlobalExtent,
    halo: HaloWidth,
}

impl Setup {
    fn new(comm: &ThreadComm, npx: usize, npy: usize, extent: GlobalExtent) -> MfResult<Self> {
        let topo = Topology::new(comm.size(), comm.rank(), npx, npy, true, true)?;
        Ok(Self {
            topo,
            extent,
            halo: HaloWidth::uniform(1),
        })
    }

    fn transposer(&self) -> MfResult<Transposer> {
        let all = partition_all(&self.topo, self.extent, self.halo)?;
        Transposer::new(&self.topo, self.extent, &all)
    }
}

/// 测试分区恰好铺满全局网格一次
#[test]
fn test_partition_tiles_exactly_once() {
    for (npx, npy) in [(1, 1), (2, 1), (1, 3), (2, 2), (4, 2)] {
        let extent = GlobalExtent::new(8, 12, 3);
        let topo = Topology::new(npx * npy, 0, npx, npy, true, true).unwrap();
        let all = partition_all(&topo, extent, HaloWidth::uniform(1)).unwrap();

        let mut hits = vec![0usize; extent.itot * extent.jtot];
        for sub in &all {
            assert_eq!(sub.kmax, extent.ktot);
            for j in sub.joffset..sub.joffset + sub.jmax {
                for i in sub.ioffset..sub.ioffset + sub.imax {
                    hits[i + j * extent.itot] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1), "npx={npx} npy={npy}");
    }
}

/// 测试晕区交换幂等：内部不变，重复交换结果相同
#[test]
fn test_halo_exchange_idempotent() {
    let out = ThreadWorld::run(4, |comm| {
        let setup = Setup::new(comm, 2, 2, GlobalExtent::new(8, 6, 3))?;
        let sub = partition(&setup.topo, setup.extent, setup.halo)?;
        let halo = HaloExchanger::new(&setup.topo, &sub);
        let (kc, jc, ic) = sub.shape();
        let mut data = Array3::from_shape_fn((kc, jc, ic), |(k, j, i)| {
            (comm.rank() * 1000 + k * 100 + j * 10 + i) as f64
        });
        let interior_before = data
            .slice(s![.., sub.jstart()..sub.jend(), sub.istart()..sub.iend()])
            .to_owned();

        halo.exchange(comm, &mut data)?;
        let once = data.clone();
        halo.exchange(comm, &mut data)?;

        let interior_after = data
            .slice(s![.., sub.jstart()..sub.jend(), sub.istart()..sub.iend()])
            .to_owned();
        Ok(interior_before == interior_after && once == data)
    })
    .unwrap();
    assert!(out.iter().all(|&ok| ok));
}

/// 测试 ZLocal→XLocal→ZLocal 往返逐位相同（含不能整除的铅笔块）
#[test]
fn test_transpose_round_trip_bit_identical() {
    let out = ThreadWorld::run(3, |comm| {
        let setup = Setup::new(comm, 1, 3, GlobalExtent::new(4, 3, 2))?;
        let sub = partition(&setup.topo, setup.extent, setup.halo)?;
        let transposer = setup.transposer()?;

        let (kc, jc, ic) = sub.shape();
        let field = Array3::from_shape_fn((kc, jc, ic), |(k, j, i)| {
            ((k * 31 + j * 7 + i) as f64).sin() / 3.0 + comm.rank() as f64
        });
        let native = transposer.from_field(&sub, &field)?;
        let x = transposer.transpose(comm, &native, PencilMode::XLocal)?;
        let back = transposer.transpose(comm, &x, PencilMode::ZLocal)?;

        let same = native
            .data
            .iter()
            .zip(back.data.iter())
            .all(|(a, b)| a.to_bits() == b.to_bits());
        Ok(same)
    })
    .unwrap();
    assert!(out.iter().all(|&ok| ok));
}

/// 测试 X→Y→Z 与 X→Z 结果相同
#[test]
fn test_transpose_composition() {
    let out = ThreadWorld::run(4, |comm| {
        let setup = Setup::new(comm, 2, 2, GlobalExtent::new(6, 4, 5))?;
        let transposer = setup.transposer()?;

        let mut x = transposer.zeros(PencilMode::XLocal);
        let b = x.block;
        for ((k, j, i), v) in x.data.indexed_iter_mut() {
            *v = ((b.i0 + i) + 10 * (b.j0 + j) + 100 * (b.k0 + k)) as f64;
        }

        let y = transposer.transpose(comm, &x, PencilMode::YLocal)?;
        let via_y = transposer.transpose(comm, &y, PencilMode::ZLocal)?;
        let direct = transposer.transpose(comm, &x, PencilMode::ZLocal)?;
        Ok(via_y.data == direct.data && via_y.block == direct.block)
    })
    .unwrap();
    assert!(out.iter().all(|&ok| ok));
}

/// 测试布局自检在多种进程网格下通过
#[test]
fn test_layout_check_passes() {
    for (npx, npy) in [(1, 1), (2, 1), (1, 3), (2, 2)] {
        let reports = ThreadWorld::run(npx * npy, |comm| {
            let setup = Setup::new(comm, npx, npy, GlobalExtent::new(4, 6, 2))?;
            let sub = partition(&setup.topo, setup.extent, setup.halo)?;
            let transposer = setup.transposer()?;
            LayoutCheck::new(&setup.topo, &sub, setup.extent).run(comm, &transposer)
        })
        .unwrap();
        for report in reports {
            assert!(report.is_ok(), "npx={npx} npy={npy}: {report:?}");
            assert!(report.halo_checked > 0);
        }
    }
}

/// 测试非周期方向上自检跳过域外晕区
#[test]
fn test_layout_check_non_periodic() {
    let reports = ThreadWorld::run(2, |comm| {
        let topo = Topology::new(2, comm.rank(), 2, 1, false, true)?;
        let extent = GlobalExtent::new(4, 2, 2);
        let halo = HaloWidth::uniform(1);
        let sub = partition(&topo, extent, halo)?;
        let all = partition_all(&topo, extent, halo)?;
        let transposer = Transposer::new(&topo, extent, &all)?;
        LayoutCheck::new(&topo, &sub, extent).run(comm, &transposer)
    })
    .unwrap();
    assert!(reports[0].is_ok());
}
