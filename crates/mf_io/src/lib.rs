// crates/mf_io/src/lib.rs

//! MicroFlow IO 模块
//!
//! 提供快照与诊断输出的文件格式。
//!
//! # 模块
//!
//! - [`paths`]: 输出文件命名规则
//! - [`checksum`]: CRC32 校验
//! - [`field_file`]: 二进制场快照（亦用于截面）
//! - [`time_record`]: 时间状态记录
//! - [`stats_store`]: 可续写的统计廓线存储
//! - [`summary`]: 逐步检查输出
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use mf_io::field_file::{FieldHeader, write_field, read_field};
//! use mf_io::paths::field_path;
//!
//! let path = field_path(datadir, "u", 100, rank);
//! write_field(&path, &header, &values)?;
//! let (header, values) = read_field(&path)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod field_file;
pub mod paths;
pub mod stats_store;
pub mod summary;
pub mod time_record;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出常用类型
pub use field_file::{read_field, write_field, FieldHeader};
pub use stats_store::{StatsHeader, StatsRecord, StatsStore};
pub use summary::{format_exp, SummaryLine, SummaryWriter};
pub use time_record::TimeRecord;
