// crates/mf_parallel/src/lib.rs

//! MicroFlow Parallel Layer (Layer 2)
//!
//! 分布式数据移动层：进程组通信、水平二维区域分解、晕区交换与铅笔转置。
//!
//! # 模块概览
//!
//! - [`comm`]: `Communicator` trait 及基于点对点的集合操作
//! - [`thread_world`]: 进程内线程实现的进程组（测试与单机运行）
//! - `mpi_comm`: 外部启动的 MPI 进程组（`mpi` 特性）
//! - [`topology`]: 进程拓扑、子区域与分区
//! - [`halo`]: 晕区交换
//! - [`transpose`]: 三种铅笔分解之间的转置
//! - [`selfcheck`]: 布局自检
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: mf_physics   ─> 压力投影使用转置，边界条件使用晕区交换
//! Layer 3: mf_fields, mf_stats ─> 全局归约、截面汇集
//! Layer 2: mf_parallel  (本层)
//! Layer 1: mf_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comm;
pub mod halo;
#[cfg(feature = "mpi")]
pub mod mpi_comm;
pub mod selfcheck;
pub mod thread_world;
pub mod topology;
pub mod transpose;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出核心类型
pub use comm::{tags, Communicator, Tag};
pub use halo::HaloExchanger;
#[cfg(feature = "mpi")]
pub use mpi_comm::{send_buffer_bytes, MpiComm, MpiWorld};
pub use selfcheck::{LayoutCheck, LayoutReport};
pub use thread_world::{ThreadComm, ThreadWorld};
pub use topology::{partition, partition_all, GlobalExtent, HaloWidth, Subdomain, Topology};
pub use transpose::{balanced_split, Block, PencilBuffer, PencilMode, Transposer};
