// apps/mf_cli/src/commands/mod.rs

//! 命令实现
//!
//! 默认在进程内线程组上运行配置的进程数；启用 `mpi` 特性时，
//! 进程由 `mpirun` 启动，每个进程各自执行同一命令。

pub mod init;
pub mod run;
pub mod selfcheck;

use anyhow::{Context, Result};
use mf_config::{ConfigSource, GridSection, MpiSection};
use mf_foundation::MfResult;
use mf_parallel::{partition, Communicator, GlobalExtent, HaloWidth, Subdomain, Topology};
use tracing::info_span;

/// 配置中的进程数
pub(crate) fn group_size(source: &ConfigSource) -> Result<usize> {
    let mpi: MpiSection = source.section().context("mpi 配置无效")?;
    Ok(mpi.size())
}

/// 本进程的拓扑与子区域
pub(crate) fn layout(source: &ConfigSource, size: usize, rank: usize) -> MfResult<(Topology, Subdomain, GlobalExtent, HaloWidth)> {
    let mpi: MpiSection = source.section()?;
    let grid: GridSection = source.section()?;
    let extent = GlobalExtent::new(grid.itot, grid.jtot, grid.ktot);
    let halo = HaloWidth {
        igc: grid.igc,
        jgc: grid.jgc,
        kgc: grid.kgc,
    };
    let topo = Topology::new(size, rank, mpi.npx, mpi.npy, grid.periodic_x, grid.periodic_y)?;
    let sub = partition(&topo, extent, halo)?;
    Ok((topo, sub, extent, halo))
}

/// 在进程组上执行 `f`，返回根进程的结果
#[cfg(not(feature = "mpi"))]
pub(crate) fn launch<T, F>(source: &ConfigSource, f: F) -> Result<Option<T>>
where
    T: Send,
    F: Fn(&dyn Communicator) -> MfResult<T> + Sync,
{
    let size = group_size(source)?;
    let results = mf_parallel::ThreadWorld::run(size, |comm| {
        let span = info_span!("rank", id = comm.rank());
        let _enter = span.enter();
        f(comm)
    })?;
    Ok(results.into_iter().next())
}

/// 在进程组上执行 `f`，返回根进程的结果；任一进程失败时终止整个组
#[cfg(feature = "mpi")]
pub(crate) fn launch<T, F>(source: &ConfigSource, f: F) -> Result<Option<T>>
where
    T: Send,
    F: Fn(&dyn Communicator) -> MfResult<T> + Sync,
{
    use mf_parallel::{send_buffer_bytes, MpiWorld};
    use tracing::error;

    let size = group_size(source)?;
    let mut world = MpiWorld::initialize()?;
    if world.size() != size {
        anyhow::bail!("mpi 配置要求 {} 个进程, 实际启动 {} 个", size, world.size());
    }
    let (_, sub, _, _) = layout(source, size, world.rank())?;
    world.attach_send_buffer(send_buffer_bytes(&sub));

    let comm = world.comm();
    let span = info_span!("rank", id = comm.rank());
    let _enter = span.enter();
    match f(&comm) {
        Ok(value) => Ok(comm.is_root().then_some(value)),
        Err(e) => {
            error!("进程 {} 失败: {}", comm.rank(), e);
            if size > 1 {
                comm.abort(1);
            }
            Err(e.into())
        }
    }
}
