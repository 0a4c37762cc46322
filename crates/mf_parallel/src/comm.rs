// crates/mf_parallel/src/comm.rs

//! 进程组通信抽象
//!
//! 所有分布式数据移动都经由 [`Communicator`]：点对点收发加上建立在其上的集合操作。
//! 消息按 `(来源, 标签)` 以先进先出顺序匹配，只要每个进程以相同顺序发起相同的集合操作，
//! 这种匹配就是无歧义的。
//!
//! 归约一律先汇集到 0 号进程，按进程编号顺序合并后再广播，
//! 因此对固定的进程数结果是确定的。

use mf_foundation::{KahanSum, MfError, MfResult};

/// 消息标签
pub type Tag = u32;

/// 预留的消息标签
pub mod tags {
    use super::Tag;

    /// 晕区交换：向东发送
    pub const HALO_EAST: Tag = 10;
    /// 晕区交换：向西发送
    pub const HALO_WEST: Tag = 11;
    /// 晕区交换：向北发送
    pub const HALO_NORTH: Tag = 12;
    /// 晕区交换：向南发送
    pub const HALO_SOUTH: Tag = 13;
    /// 全交换（转置）
    pub const ALL_TO_ALL: Tag = 20;
    /// 汇集
    pub const GATHER: Tag = 30;
    /// 广播
    pub const BROADCAST: Tag = 31;
}

/// 进程组通信接口
///
/// 实现只需提供点对点收发；集合操作均有基于点对点的默认实现。
pub trait Communicator: Send {
    /// 本进程编号
    fn rank(&self) -> usize;

    /// 进程总数
    fn size(&self) -> usize;

    /// 发送一条消息（不阻塞）
    fn send(&self, dest: usize, tag: Tag, data: Vec<f64>) -> MfResult<()>;

    /// 接收来自 `source` 的下一条 `tag` 消息（阻塞）
    fn recv(&self, source: usize, tag: Tag) -> MfResult<Vec<f64>>;

    /// 自进程组建立以来的墙钟时间 [s]
    fn wtime(&self) -> f64;

    /// 是否为根进程
    fn is_root(&self) -> bool {
        self.rank() == 0
    }

    /// 汇集到根进程，根进程按编号顺序得到全部数据
    fn gather(&self, local: Vec<f64>) -> MfResult<Option<Vec<Vec<f64>>>> {
        if self.is_root() {
            let mut all = Vec::with_capacity(self.size());
            all.push(local);
            for source in 1..self.size() {
                all.push(self.recv(source, tags::GATHER)?);
            }
            Ok(Some(all))
        } else {
            self.send(0, tags::GATHER, local)?;
            Ok(None)
        }
    }

    /// 从根进程广播
    fn broadcast(&self, data: Vec<f64>) -> MfResult<Vec<f64>> {
        if self.is_root() {
            for dest in 1..self.size() {
                self.send(dest, tags::BROADCAST, data.clone())?;
            }
            Ok(data)
        } else {
            self.recv(0, tags::BROADCAST)
        }
    }

    /// 逐元素全局求和
    fn all_reduce_sum_vec(&self, local: &[f64]) -> MfResult<Vec<f64>> {
        let reduced = match self.gather(local.to_vec())? {
            Some(all) => {
                let mut total = vec![KahanSum::new(); local.len()];
                for (source, part) in all.iter().enumerate() {
                    MfError::check_len(&format!("求和归约 (来自进程 {source})"), total.len(), part.len())?;
                    for (t, &v) in total.iter_mut().zip(part) {
                        t.add(v);
                    }
                }
                total.iter().map(KahanSum::value).collect()
            }
            None => Vec::new(),
        };
        let result = self.broadcast(reduced)?;
        MfError::check_len("求和归约广播", local.len(), result.len())?;
        Ok(result)
    }

    /// 全局求和
    fn sum(&self, local: f64) -> MfResult<f64> {
        Ok(self.all_reduce_sum_vec(&[local])?[0])
    }

    /// 逐元素全局最大值
    fn all_reduce_max_vec(&self, local: &[f64]) -> MfResult<Vec<f64>> {
        let reduced = match self.gather(local.to_vec())? {
            Some(all) => {
                let mut total = vec![f64::NEG_INFINITY; local.len()];
                for (source, part) in all.iter().enumerate() {
                    MfError::check_len(&format!("最大值归约 (来自进程 {source})"), total.len(), part.len())?;
                    for (t, &v) in total.iter_mut().zip(part) {
                        // NaN 优先保留
                        if v.is_nan() || v > *t {
                            *t = v;
                        }
                    }
                }
                total
            }
            None => Vec::new(),
        };
        let result = self.broadcast(reduced)?;
        MfError::check_len("最大值归约广播", local.len(), result.len())?;
        Ok(result)
    }

    /// 全局最大值
    fn max(&self, local: f64) -> MfResult<f64> {
        Ok(self.all_reduce_max_vec(&[local])?[0])
    }

    /// 全体一致：所有进程都为真时才为真
    fn all_agree(&self, ok: bool) -> MfResult<bool> {
        let failures = self.sum(if ok { 0.0 } else { 1.0 })?;
        Ok(failures == 0.0)
    }

    /// 变长全交换，`outgoing[r]` 发往进程 r，返回值第 r 项来自进程 r
    fn all_to_all_v(&self, outgoing: Vec<Vec<f64>>) -> MfResult<Vec<Vec<f64>>> {
        MfError::check_len("全交换发送缓冲数", self.size(), outgoing.len())?;
        let me = self.rank();
        let mut own = Vec::new();
        for (dest, data) in outgoing.into_iter().enumerate() {
            if dest == me {
                own = data;
            } else {
                self.send(dest, tags::ALL_TO_ALL, data)?;
            }
        }
        let mut incoming = Vec::with_capacity(self.size());
        for source in 0..self.size() {
            if source == me {
                incoming.push(std::mem::take(&mut own));
            } else {
                incoming.push(self.recv(source, tags::ALL_TO_ALL)?);
            }
        }
        Ok(incoming)
    }

    /// 同步栅栏
    fn barrier(&self) -> MfResult<()> {
        self.all_reduce_sum_vec(&[]).map(|_| ())
    }
}
