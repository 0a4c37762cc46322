// crates/mf_parallel/src/mpi_comm.rs

//! MPI 进程组（`mpi` 特性）
//!
//! 进程由外部启动器（`mpirun -n N mf_cli ...`）创建，彼此不共享内存。
//! 点对点发送使用缓冲模式，调用立即返回，满足先发后收的晕区交换顺序；
//! 发送缓冲区须在首次交换前用 [`MpiWorld::attach_send_buffer`] 挂上。
//! 集合操作直接映射到 MPI 集合通信，求和与最大值先全收集，
//! 再按进程编号顺序合并，进程数固定时结果确定。
//!
//! ```ignore
//! let mut world = MpiWorld::initialize()?;
//! world.attach_send_buffer(send_buffer_bytes(&sub));
//! let comm = world.comm();
//! ```

use std::marker::PhantomData;

use mf_foundation::{KahanSum, MfError, MfResult};
use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::{Rank, SimpleCommunicator};
use mpi::traits::{Communicator as _, CommunicatorCollectives as _, Destination as _, Root as _, Source as _};
use mpi::Count;
use tracing::debug;

use crate::comm::{Communicator, Tag};
use crate::topology::Subdomain;

/// 每条缓冲消息的额外开销上限 [B]
const BSEND_OVERHEAD: usize = 1024;

/// 同时在途的晕区消息数（x、y 两个方向各两块）
const HALO_MESSAGES_IN_FLIGHT: usize = 4;

/// 晕区交换所需的发送缓冲大小 [B]
pub fn send_buffer_bytes(sub: &Subdomain) -> usize {
    let (kc, _, ic) = sub.shape();
    let x_slab = sub.igc * sub.jmax * kc;
    let y_slab = sub.jgc * ic * kc;
    HALO_MESSAGES_IN_FLIGHT * (x_slab.max(y_slab) * std::mem::size_of::<f64>() + BSEND_OVERHEAD)
}

/// MPI 环境，析构时结束 MPI
pub struct MpiWorld {
    universe: Universe,
}

impl MpiWorld {
    /// 初始化 MPI；每个进程只能调用一次
    pub fn initialize() -> MfResult<Self> {
        let universe = mpi::initialize().ok_or_else(|| MfError::io("MPI 已初始化或无法初始化"))?;
        Ok(Self { universe })
    }

    /// 进程总数
    pub fn size(&self) -> usize {
        self.universe.world().size() as usize
    }

    /// 本进程编号
    pub fn rank(&self) -> usize {
        self.universe.world().rank() as usize
    }

    /// 挂上缓冲模式发送所用的缓冲区
    pub fn attach_send_buffer(&mut self, bytes: usize) {
        debug!("MPI 发送缓冲 {} B", bytes);
        self.universe.set_buffer_size(bytes);
    }

    /// 世界通信器，只在本环境存活期间有效
    pub fn comm(&self) -> MpiComm<'_> {
        MpiComm {
            rank: self.rank(),
            size: self.size(),
            epoch: mpi::environment::time(),
            _world: PhantomData,
        }
    }
}

/// MPI 通信器
pub struct MpiComm<'w> {
    rank: usize,
    size: usize,
    epoch: f64,
    _world: PhantomData<fn() -> &'w ()>,
}

impl MpiComm<'_> {
    /// 终止整个进程组
    pub fn abort(&self, code: i32) -> ! {
        SimpleCommunicator::world().abort(code)
    }

    fn peer(&self, rank: usize, what: &str) -> MfResult<Rank> {
        if rank >= self.size {
            return Err(MfError::protocol(format!("{what}进程 {rank} 超出进程组规模 {}", self.size)));
        }
        Ok(rank as Rank)
    }

    /// 全收集等长数据，结果按进程编号首尾相接
    fn all_gather(&self, local: &[f64]) -> Vec<f64> {
        let mut all = vec![0.0; local.len() * self.size];
        if !local.is_empty() {
            SimpleCommunicator::world().all_gather_into(local, &mut all[..]);
        }
        all
    }
}

fn to_count(n: usize) -> MfResult<Count> {
    Count::try_from(n).map_err(|_| MfError::protocol(format!("消息长度 {n} 超出 MPI 计数范围")))
}

fn displacements(counts: &[Count]) -> MfResult<Vec<Count>> {
    let mut displs = Vec::with_capacity(counts.len());
    let mut offset: usize = 0;
    for &c in counts {
        displs.push(to_count(offset)?);
        offset += c as usize;
    }
    to_count(offset)?;
    Ok(displs)
}

fn split(buffer: &[f64], counts: &[Count]) -> Vec<Vec<f64>> {
    let mut parts = Vec::with_capacity(counts.len());
    let mut rest = buffer;
    for &c in counts {
        let (head, tail) = rest.split_at(c as usize);
        parts.push(head.to_vec());
        rest = tail;
    }
    parts
}

impl Communicator for MpiComm<'_> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, data: Vec<f64>) -> MfResult<()> {
        let dest = self.peer(dest, "目标")?;
        SimpleCommunicator::world()
            .process_at_rank(dest)
            .buffered_send_with_tag(&data[..], tag as mpi::Tag);
        Ok(())
    }

    fn recv(&self, source: usize, tag: Tag) -> MfResult<Vec<f64>> {
        let source = self.peer(source, "来源")?;
        let (data, _status) = SimpleCommunicator::world()
            .process_at_rank(source)
            .receive_vec_with_tag::<f64>(tag as mpi::Tag);
        Ok(data)
    }

    fn wtime(&self) -> f64 {
        mpi::environment::time() - self.epoch
    }

    fn gather(&self, local: Vec<f64>) -> MfResult<Option<Vec<Vec<f64>>>> {
        let world = SimpleCommunicator::world();
        let mut counts: Vec<Count> = vec![0; self.size];
        world.all_gather_into(&to_count(local.len())?, &mut counts[..]);
        let root = world.process_at_rank(0);

        if self.is_root() {
            let displs = displacements(&counts)?;
            let total = counts.iter().map(|&c| c as usize).sum();
            let mut buffer = vec![0.0; total];
            {
                let mut partition = PartitionMut::new(&mut buffer[..], &counts[..], &displs[..]);
                root.gather_varcount_into_root(&local[..], &mut partition);
            }
            Ok(Some(split(&buffer, &counts)))
        } else {
            root.gather_varcount_into(&local[..]);
            Ok(None)
        }
    }

    fn broadcast(&self, data: Vec<f64>) -> MfResult<Vec<f64>> {
        let world = SimpleCommunicator::world();
        let root = world.process_at_rank(0);
        let mut len = data.len() as u64;
        root.broadcast_into(&mut len);
        let mut buffer = if self.is_root() { data } else { vec![0.0; len as usize] };
        if !buffer.is_empty() {
            root.broadcast_into(&mut buffer[..]);
        }
        Ok(buffer)
    }

    fn all_reduce_sum_vec(&self, local: &[f64]) -> MfResult<Vec<f64>> {
        let all = self.all_gather(local);
        let mut total = vec![KahanSum::new(); local.len()];
        for part in all.chunks(local.len().max(1)) {
            for (t, &v) in total.iter_mut().zip(part) {
                t.add(v);
            }
        }
        Ok(total.iter().map(KahanSum::value).collect())
    }

    fn all_reduce_max_vec(&self, local: &[f64]) -> MfResult<Vec<f64>> {
        let all = self.all_gather(local);
        let mut total = vec![f64::NEG_INFINITY; local.len()];
        for part in all.chunks(local.len().max(1)) {
            for (t, &v) in total.iter_mut().zip(part) {
                if v.is_nan() || v > *t {
                    *t = v;
                }
            }
        }
        Ok(total)
    }

    fn all_to_all_v(&self, outgoing: Vec<Vec<f64>>) -> MfResult<Vec<Vec<f64>>> {
        MfError::check_len("全交换发送缓冲数", self.size, outgoing.len())?;
        let world = SimpleCommunicator::world();

        let send_counts = outgoing
            .iter()
            .map(|part| to_count(part.len()))
            .collect::<MfResult<Vec<Count>>>()?;
        let mut recv_counts: Vec<Count> = vec![0; self.size];
        world.all_to_all_into(&send_counts[..], &mut recv_counts[..]);

        let send_displs = displacements(&send_counts)?;
        let recv_displs = displacements(&recv_counts)?;
        let send_buffer = outgoing.concat();
        let mut recv_buffer = vec![0.0; recv_counts.iter().map(|&c| c as usize).sum()];
        {
            let send = Partition::new(&send_buffer[..], &send_counts[..], &send_displs[..]);
            let mut recv = PartitionMut::new(&mut recv_buffer[..], &recv_counts[..], &recv_displs[..]);
            world.all_to_all_varcount_into(&send, &mut recv);
        }
        Ok(split(&recv_buffer, &recv_counts))
    }

    fn barrier(&self) -> MfResult<()> {
        SimpleCommunicator::world().barrier();
        Ok(())
    }
}
