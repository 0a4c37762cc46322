// crates/mf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `MfError` 枚举和 `MfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! | 类别 | 变体 | 主循环中是否致命 |
//! |------|------|------------------|
//! | 配置 | `Config` | 是（仅初始化阶段出现） |
//! | 分区 | `Partition` | 是（仅初始化阶段出现） |
//! | 协议 | `Protocol` | 是 |
//! | IO | `Io` / `FileNotFound` / `CorruptSnapshot` | 是 |
//! | 数值 | `Numerical` | 否，仅报告 |
//! | 编程 | `Programming` | 是 |
//!
//! 任何进程检测到致命错误时，整个进程组都必须终止，不允许部分进程继续。
//!
//! # 示例
//!
//! ```
//! use mf_foundation::error::{MfError, MfResult};
//!
//! fn read_config() -> MfResult<()> {
//!     Err(MfError::config("npx*npy 与进程总数不符"))
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type MfResult<T> = Result<T, MfError>;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 配置格式错误、缺失或进程网格分解不匹配
    Configuration,
    /// 网格无法均分
    Partition,
    /// 晕区/转置数据量不匹配（拓扑状态损坏）
    Protocol,
    /// 快照读写失败
    Io,
    /// 求解残差超出容差
    Numerical,
    /// 调用顺序错误
    Programming,
}

/// MicroFlow 错误类型
#[derive(Error, Debug)]
pub enum MfError {
    // ========================================================================
    // 初始化阶段错误
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 网格无法均分到进程
    #[error("分区错误: {axis} 方向 {cells} 个网格无法均分给 {parts} 个进程")]
    Partition {
        /// 分解方向
        axis: &'static str,
        /// 该方向全局网格数
        cells: usize,
        /// 该方向进程数
        parts: usize,
    },

    // ========================================================================
    // 通信错误
    // ========================================================================
    /// 通信协议错误
    #[error("通信协议错误: {message}")]
    Protocol {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // IO 相关错误
    // ========================================================================
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 快照损坏或与当前网格不符
    #[error("快照损坏: {path}, 原因: {reason}")]
    CorruptSnapshot {
        /// 快照路径
        path: PathBuf,
        /// 损坏原因
        reason: String,
    },

    // ========================================================================
    // 数值与编程错误
    // ========================================================================
    /// 数值误差超出容差
    #[error("数值误差超限: {quantity}={value:.3e}, 容差={tolerance:.3e}")]
    Numerical {
        /// 物理量名称
        quantity: String,
        /// 实际值
        value: f64,
        /// 容差
        tolerance: f64,
    },

    /// 调用顺序错误
    #[error("编程错误: {message}")]
    Programming {
        /// 具体错误信息
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl MfError {
    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 分区错误
    pub fn partition(axis: &'static str, cells: usize, parts: usize) -> Self {
        Self::Partition { axis, cells, parts }
    }

    /// 通信协议错误
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// IO 错误（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 快照损坏
    pub fn corrupt_snapshot(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 数值误差超限
    pub fn numerical(quantity: impl Into<String>, value: f64, tolerance: f64) -> Self {
        Self::Numerical {
            quantity: quantity.into(),
            value,
            tolerance,
        }
    }

    /// 编程错误
    pub fn programming(message: impl Into<String>) -> Self {
        Self::Programming {
            message: message.into(),
        }
    }

    /// 错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Configuration,
            Self::Partition { .. } => ErrorKind::Partition,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Io { .. } | Self::FileNotFound { .. } | Self::CorruptSnapshot { .. } => {
                ErrorKind::Io
            }
            Self::Numerical { .. } => ErrorKind::Numerical,
            Self::Programming { .. } => ErrorKind::Programming,
        }
    }

    /// 是否必须终止整个进程组
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::Numerical
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl MfError {
    /// 检查通信数据长度是否匹配
    #[inline]
    pub fn check_len(what: &str, expected: usize, actual: usize) -> MfResult<()> {
        if expected != actual {
            Err(Self::protocol(format!(
                "{what}: 期望 {expected} 个值, 实际收到 {actual} 个"
            )))
        } else {
            Ok(())
        }
    }
}

/// 条件不满足时返回错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for MfError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MfError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_partition_display() {
        let err = MfError::partition("x", 10, 3);
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("3"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(MfError::io("x").kind(), ErrorKind::Io);
        assert_eq!(MfError::file_not_found("/tmp/u").kind(), ErrorKind::Io);
        assert_eq!(MfError::corrupt_snapshot("/tmp/u", "crc").kind(), ErrorKind::Io);
        assert_eq!(MfError::protocol("x").kind(), ErrorKind::Protocol);
        assert_eq!(MfError::programming("x").kind(), ErrorKind::Programming);
    }

    #[test]
    fn test_only_numerical_is_not_fatal() {
        assert!(!MfError::numerical("div", 1.0, 1e-8).is_fatal());
        assert!(MfError::protocol("x").is_fatal());
        assert!(MfError::config("x").is_fatal());
    }

    #[test]
    fn test_check_len() {
        assert!(MfError::check_len("halo", 10, 10).is_ok());
        let err = MfError::check_len("halo", 10, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: MfError = io_err.into();
        assert!(matches!(err, MfError::Io { .. }));
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> MfResult<()> {
            ensure!(value > 0, MfError::config("value must be positive"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }
}
