// crates/mf_io/src/time_record.rs

//! 时间状态记录
//!
//! 与场快照同迭代步保存，重放或续算时恢复原来的时钟。

use std::io::ErrorKind;
use std::path::Path;

use mf_foundation::{MfError, MfResult};
use serde::{Deserialize, Serialize};

use crate::field_file::temp_path;
use crate::paths::time_path;

/// 时间记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRecord {
    /// 迭代步
    pub iteration: u64,
    /// 模拟时间 [s]
    pub time: f64,
    /// 时间步长 [s]
    pub dt: f64,
}

impl TimeRecord {
    /// 写入 `<dir>/time.<iteration:07>`
    pub fn save(&self, dir: &Path) -> MfResult<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| MfError::io_with_source(format!("无法创建目录 {}", dir.display()), e))?;
        let path = time_path(dir, self.iteration);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MfError::io(format!("时间记录序列化失败: {e}")))?;

        let temp = temp_path(&path);
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &path)
            .map_err(|e| MfError::io_with_source(format!("无法重命名为 {}", path.display()), e))?;
        Ok(())
    }

    /// 读取指定迭代步的时间记录
    pub fn load(dir: &Path, iteration: u64) -> MfResult<Self> {
        let path = time_path(dir, iteration);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(MfError::file_not_found(path)),
            Err(e) => return Err(MfError::io_with_source(format!("无法读取 {}", path.display()), e)),
        };
        let record: TimeRecord = serde_json::from_str(&content)
            .map_err(|e| MfError::corrupt_snapshot(&path, e.to_string()))?;
        if record.iteration != iteration {
            return Err(MfError::corrupt_snapshot(
                &path,
                format!("记录迭代步 {} 与文件名 {iteration} 不符", record.iteration),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_foundation::ErrorKind as MfKind;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let record = TimeRecord {
            iteration: 40,
            time: 12.5,
            dt: 0.3125,
        };
        record.save(dir.path()).unwrap();
        assert_eq!(TimeRecord::load(dir.path(), 40).unwrap(), record);
    }

    #[test]
    fn test_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let err = TimeRecord::load(dir.path(), 90).unwrap_err();
        assert_eq!(err.kind(), MfKind::Io);
    }

    #[test]
    fn test_mismatched_iteration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            time_path(dir.path(), 5),
            r#"{ "iteration": 6, "time": 1.0, "dt": 0.1 }"#,
        )
        .unwrap();
        assert!(matches!(
            TimeRecord::load(dir.path(), 5),
            Err(MfError::CorruptSnapshot { .. })
        ));
    }
}
