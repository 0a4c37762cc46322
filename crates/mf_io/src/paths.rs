// crates/mf_io/src/paths.rs

//! 输出文件命名
//!
//! | 文件 | 名称 |
//! |------|------|
//! | 场快照 | `<field>.<iteration:07>.<rank:05>` |
//! | 时间记录 | `time.<iteration:07>` |
//! | 截面 | `<var>.<xy\|xz\|yz>.<index:05>.<iteration:07>` |
//! | 统计 | `<simname>.stats.jsonl` |
//! | 检查输出 | `<simname>.out` |

use std::path::{Path, PathBuf};

/// 场快照路径
pub fn field_path(dir: &Path, name: &str, iteration: u64, rank: usize) -> PathBuf {
    dir.join(format!("{name}.{iteration:07}.{rank:05}"))
}

/// 时间记录路径
pub fn time_path(dir: &Path, iteration: u64) -> PathBuf {
    dir.join(format!("time.{iteration:07}"))
}

/// 截面文件路径
pub fn cross_path(dir: &Path, variable: &str, orientation: &str, index: usize, iteration: u64) -> PathBuf {
    dir.join(format!("{variable}.{orientation}.{index:05}.{iteration:07}"))
}

/// 统计文件路径
pub fn stats_path(dir: &Path, simname: &str) -> PathBuf {
    dir.join(format!("{simname}.stats.jsonl"))
}

/// 检查输出路径
pub fn summary_path(dir: &Path, simname: &str) -> PathBuf {
    dir.join(format!("{simname}.out"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let dir = Path::new("data");
        assert_eq!(field_path(dir, "u", 120, 3), Path::new("data/u.0000120.00003"));
        assert_eq!(time_path(dir, 7), Path::new("data/time.0000007"));
        assert_eq!(cross_path(dir, "s", "xz", 4, 50), Path::new("data/s.xz.00004.0000050"));
        assert_eq!(stats_path(dir, "drycbl"), Path::new("data/drycbl.stats.jsonl"));
    }
}
