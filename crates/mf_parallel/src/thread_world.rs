// crates/mf_parallel/src/thread_world.rs

//! 进程内通信实现
//!
//! 用一组线程模拟固定规模的进程组，每个线程即一个单线程"进程"，
//! 通过无界通道交换消息。任一进程出错或 panic 时设置共享的中止标志，
//! 所有阻塞在接收上的进程随之返回错误，整个组一起终止。
//!
//! ```
//! use mf_parallel::{Communicator, ThreadWorld};
//!
//! let sums = ThreadWorld::run(3, |comm| comm.sum(comm.rank() as f64)).unwrap();
//! assert_eq!(sums, vec![3.0, 3.0, 3.0]);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mf_foundation::{MfError, MfResult};
use tracing::debug;

use crate::comm::{Communicator, Tag};

/// 中止标志未设置
const NOT_ABORTED: usize = usize::MAX;

/// 接收轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Envelope {
    source: usize,
    tag: Tag,
    payload: Vec<f64>,
}

/// 进程内通信器
pub struct ThreadComm {
    rank: usize,
    size: usize,
    outboxes: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    /// 已到达但尚未被匹配的消息
    pending: RefCell<VecDeque<Envelope>>,
    /// 首个失败进程的编号
    aborted_by: Arc<AtomicUsize>,
    epoch: Instant,
}

impl ThreadComm {
    /// 标记整个组中止
    pub fn abort(&self) {
        let _ = self.aborted_by.compare_exchange(
            NOT_ABORTED,
            self.rank,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// 组是否已中止
    pub fn is_aborted(&self) -> bool {
        self.aborted_by.load(Ordering::SeqCst) != NOT_ABORTED
    }

    fn take_pending(&self, source: usize, tag: Tag) -> Option<Vec<f64>> {
        let mut pending = self.pending.borrow_mut();
        let pos = pending
            .iter()
            .position(|env| env.source == source && env.tag == tag)?;
        pending.remove(pos).map(|env| env.payload)
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, data: Vec<f64>) -> MfResult<()> {
        let outbox = self.outboxes.get(dest).ok_or_else(|| {
            MfError::protocol(format!("目标进程 {dest} 超出进程组规模 {}", self.size))
        })?;
        outbox
            .send(Envelope {
                source: self.rank,
                tag,
                payload: data,
            })
            .map_err(|_| MfError::protocol(format!("进程 {dest} 已退出, 无法发送标签 {tag}")))
    }

    fn recv(&self, source: usize, tag: Tag) -> MfResult<Vec<f64>> {
        if source >= self.size {
            return Err(MfError::protocol(format!(
                "来源进程 {source} 超出进程组规模 {}",
                self.size
            )));
        }
        loop {
            if let Some(payload) = self.take_pending(source, tag) {
                return Ok(payload);
            }
            if self.is_aborted() {
                return Err(MfError::protocol(format!(
                    "进程组已中止 (进程 {} 等待来自 {source} 的标签 {tag})",
                    self.rank
                )));
            }
            match self.inbox.recv_timeout(POLL_INTERVAL) {
                Ok(env) if env.source == source && env.tag == tag => return Ok(env.payload),
                Ok(env) => self.pending.borrow_mut().push_back(env),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(MfError::protocol("通信通道已断开"));
                }
            }
        }
    }

    fn wtime(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// 出错或 panic 时触发组中止
struct AbortGuard<'a> {
    comm: &'a ThreadComm,
    armed: bool,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.comm.abort();
        }
    }
}

/// 进程内进程组
pub struct ThreadWorld;

impl ThreadWorld {
    /// 创建 `size` 个互相连通的通信器
    pub fn create(size: usize) -> MfResult<Vec<ThreadComm>> {
        if size == 0 {
            return Err(MfError::config("进程组规模至少为 1"));
        }
        let (outboxes, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| mpsc::channel()).unzip();
        let aborted_by = Arc::new(AtomicUsize::new(NOT_ABORTED));
        let epoch = Instant::now();

        Ok(inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ThreadComm {
                rank,
                size,
                outboxes: outboxes.clone(),
                inbox,
                pending: RefCell::new(VecDeque::new()),
                aborted_by: Arc::clone(&aborted_by),
                epoch,
            })
            .collect())
    }

    /// 在 `size` 个进程上运行同一函数，按进程编号返回结果
    ///
    /// 任一进程失败时整个组终止，返回首个失败进程的错误。
    pub fn run<T, F>(size: usize, f: F) -> MfResult<Vec<T>>
    where
        T: Send,
        F: Fn(&ThreadComm) -> MfResult<T> + Sync,
    {
        let comms = Self::create(size)?;
        let aborted_by = Arc::clone(&comms[0].aborted_by);
        let f = &f;

        let outcomes: Vec<MfResult<T>> = thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    thread::Builder::new()
                        .name(format!("rank-{}", comm.rank))
                        .spawn_scoped(scope, move || {
                            let mut guard = AbortGuard { comm: &comm, armed: true };
                            let result = f(&comm);
                            if result.is_ok() {
                                guard.armed = false;
                            } else {
                                debug!("进程 {} 失败, 中止进程组", comm.rank);
                            }
                            drop(guard);
                            result
                        })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle {
                    Ok(h) => h
                        .join()
                        .unwrap_or_else(|_| Err(MfError::programming(format!("进程 {rank} panic")))),
                    Err(e) => Err(MfError::io_with_source(format!("无法启动进程 {rank}"), e)),
                })
                .collect()
        });

        let first_failed = aborted_by.load(Ordering::SeqCst);
        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for (rank, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    if rank == first_failed || first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_foundation::ErrorKind;

    #[test]
    fn test_point_to_point_fifo() {
        let out = ThreadWorld::run(2, |comm| {
            if comm.rank() == 0 {
                comm.send(1, 7, vec![1.0])?;
                comm.send(1, 7, vec![2.0])?;
                comm.send(1, 8, vec![3.0])?;
                Ok(Vec::new())
            } else {
                // 先取标签 8，标签 7 的两条消息须保持顺序
                let c = comm.recv(0, 8)?;
                let a = comm.recv(0, 7)?;
                let b = comm.recv(0, 7)?;
                Ok(vec![a[0], b[0], c[0]])
            }
        })
        .unwrap();
        assert_eq!(out[1], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_send_to_self() {
        let out = ThreadWorld::run(1, |comm| {
            comm.send(0, 1, vec![4.0, 5.0])?;
            comm.recv(0, 1)
        })
        .unwrap();
        assert_eq!(out[0], vec![4.0, 5.0]);
    }

    #[test]
    fn test_collectives() {
        let out = ThreadWorld::run(4, |comm| {
            let r = comm.rank() as f64;
            let sum = comm.sum(r)?;
            let max = comm.max(r)?;
            let vec = comm.all_reduce_sum_vec(&[r, 1.0])?;
            let agree = comm.all_agree(comm.rank() != 2)?;
            comm.barrier()?;
            Ok((sum, max, vec, agree))
        })
        .unwrap();
        for (sum, max, vec, agree) in out {
            assert_eq!(sum, 6.0);
            assert_eq!(max, 3.0);
            assert_eq!(vec, vec![6.0, 4.0]);
            assert!(!agree);
        }
    }

    #[test]
    fn test_all_to_all() {
        let out = ThreadWorld::run(3, |comm| {
            let me = comm.rank() as f64;
            let outgoing = (0..3).map(|d| vec![me * 10.0 + d as f64; d + 1]).collect();
            comm.all_to_all_v(outgoing)
        })
        .unwrap();
        // 进程 2 从进程 1 收到 3 个 12.0
        assert_eq!(out[2][1], vec![12.0; 3]);
        assert_eq!(out[0][2], vec![20.0]);
    }

    #[test]
    fn test_failure_terminates_group() {
        let result: MfResult<Vec<()>> = ThreadWorld::run(3, |comm| {
            if comm.rank() == 1 {
                return Err(MfError::io("快照缺失"));
            }
            // 其余进程阻塞在归约上，须随组中止返回
            comm.sum(1.0)?;
            Ok(())
        });
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_panic_terminates_group() {
        let result: MfResult<Vec<()>> = ThreadWorld::run(2, |comm| {
            if comm.rank() == 0 {
                panic!("boom");
            }
            comm.recv(0, 3).map(|_| ())
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Programming);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(ThreadWorld::create(0).is_err());
    }
}
