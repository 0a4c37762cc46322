// crates/mf_io/src/stats_store.rs

//! 统计廓线存储
//!
//! JSON Lines 文件：首行为头部（层高），其后每次统计追加一行记录。
//! 从某一迭代步续算时，丢弃迭代步不小于起始步的旧记录，再继续追加，
//! 因此重跑同一区间不会出现重复记录。

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, LineWriter, Write};
use std::path::{Path, PathBuf};

use mf_foundation::{MfError, MfResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::field_file::temp_path;

/// 统计文件头部
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsHeader {
    /// 模拟名
    pub simname: String,
    /// 全层高度
    pub z: Vec<f64>,
    /// 半层高度
    pub zh: Vec<f64>,
}

/// 一次统计的全部廓线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// 迭代步
    pub iteration: u64,
    /// 模拟时间 [s]
    pub time: f64,
    /// 廓线，键为 `<变量>.<量>`
    pub profiles: BTreeMap<String, Vec<f64>>,
}

/// 统计存储（仅根进程持有）
pub struct StatsStore {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl StatsStore {
    /// 新建或续写统计文件
    pub fn create(path: &Path, header: &StatsHeader, start_iteration: u64) -> MfResult<Self> {
        let kept = if path.exists() {
            let (_, records) = Self::read(path)?;
            let total = records.len();
            let kept: Vec<StatsRecord> = records
                .into_iter()
                .filter(|r| r.iteration < start_iteration)
                .collect();
            info!(
                "续写统计文件 {}: 保留 {} 条记录, 丢弃 {} 条",
                path.display(),
                kept.len(),
                total - kept.len()
            );
            kept
        } else {
            Vec::new()
        };

        // 重写头部和保留的记录
        let temp = temp_path(path);
        {
            let mut writer = LineWriter::new(File::create(&temp)?);
            write_json_line(&mut writer, header)?;
            for record in &kept {
                write_json_line(&mut writer, record)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&temp, path)
            .map_err(|e| MfError::io_with_source(format!("无法重命名为 {}", path.display()), e))?;

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: LineWriter::new(file),
        })
    }

    /// 文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条记录
    pub fn append(&mut self, record: &StatsRecord) -> MfResult<()> {
        write_json_line(&mut self.writer, record)
    }

    /// 读取整个统计文件
    pub fn read(path: &Path) -> MfResult<(StatsHeader, Vec<StatsRecord>)> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(MfError::file_not_found(path)),
            Err(e) => return Err(MfError::io_with_source(format!("无法读取 {}", path.display()), e)),
        };
        let mut lines = BufReader::new(file).lines();

        let first = lines
            .next()
            .ok_or_else(|| MfError::corrupt_snapshot(path, "缺少头部"))??;
        let header: StatsHeader = serde_json::from_str(&first)
            .map_err(|e| MfError::corrupt_snapshot(path, format!("头部: {e}")))?;

        let mut records = Vec::new();
        for (n, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: StatsRecord = serde_json::from_str(&line)
                .map_err(|e| MfError::corrupt_snapshot(path, format!("第 {} 行: {e}", n + 2)))?;
            records.push(record);
        }
        Ok((header, records))
    }
}

fn write_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> MfResult<()> {
    let line = serde_json::to_string(value).map_err(|e| MfError::io(format!("统计序列化失败: {e}")))?;
    writeln!(writer, "{line}")?;
    Ok(())
}
