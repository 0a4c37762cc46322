// crates/mf_io/src/field_file.rs

//! 二进制场快照
//!
//! 每个进程写自己子区域的内部值，截面文件复用同一格式。
//!
//! # 文件格式
//!
//! ```text
//! [魔数: 4 bytes] "MFFD"
//! [版本: u32]
//! [迭代步: u64]
//! [nx, ny, nz: u64 × 3]
//! [ioffset, joffset, koffset: u64 × 3]
//! [数据: nx*ny*nz × f64]  按 [k][j][i] 顺序
//! [CRC32: u32]
//! ```
//!
//! 先写临时文件，成功后重命名，读取方不会看到写了一半的快照。

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use mf_foundation::{MfError, MfResult};

use crate::checksum::crc32;

/// 文件格式版本
const FIELD_VERSION: u32 = 1;

/// 魔数
const FIELD_MAGIC: &[u8; 4] = b"MFFD";

/// 头部字节数
const HEADER_BYTES: usize = 4 + 4 + 8 * 7;

/// 快照头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    /// 迭代步
    pub iteration: u64,
    /// x 方向数值个数
    pub nx: usize,
    /// y 方向数值个数
    pub ny: usize,
    /// z 方向数值个数
    pub nz: usize,
    /// 全局 i 偏移
    pub ioffset: usize,
    /// 全局 j 偏移
    pub joffset: usize,
    /// 全局 k 偏移
    pub koffset: usize,
}

impl FieldHeader {
    /// 数值个数
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 形状与偏移是否一致（忽略迭代步）
    pub fn same_layout(&self, other: &FieldHeader) -> bool {
        (self.nx, self.ny, self.nz, self.ioffset, self.joffset, self.koffset)
            == (other.nx, other.ny, other.nz, other.ioffset, other.joffset, other.koffset)
    }
}

/// 临时文件路径（在原文件名后追加后缀）
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// 写入场快照
pub fn write_field(path: &Path, header: &FieldHeader, data: &[f64]) -> MfResult<()> {
    MfError::check_len("写入快照数据", header.len(), data.len())?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MfError::io_with_source(format!("无法创建目录 {}", parent.display()), e))?;
        }
    }

    let mut bytes = Vec::with_capacity(HEADER_BYTES + data.len() * 8 + 4);
    bytes.extend_from_slice(FIELD_MAGIC);
    bytes.extend_from_slice(&FIELD_VERSION.to_le_bytes());
    for v in [
        header.iteration,
        header.nx as u64,
        header.ny as u64,
        header.nz as u64,
        header.ioffset as u64,
        header.joffset as u64,
        header.koffset as u64,
    ] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(bytemuck::cast_slice(data));
    let crc = crc32(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());

    let temp = temp_path(path);
    {
        let file = File::create(&temp)
            .map_err(|e| MfError::io_with_source(format!("无法创建 {}", temp.display()), e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
    }
    std::fs::rename(&temp, path)
        .map_err(|e| MfError::io_with_source(format!("无法重命名为 {}", path.display()), e))?;
    Ok(())
}

/// 读取场快照
pub fn read_field(path: &Path) -> MfResult<(FieldHeader, Vec<f64>)> {
    let all = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(MfError::file_not_found(path)),
        Err(e) => return Err(MfError::io_with_source(format!("无法读取 {}", path.display()), e)),
    };

    if all.len() < HEADER_BYTES + 4 {
        return Err(MfError::corrupt_snapshot(path, "文件太小"));
    }

    let (body, crc_bytes) = all.split_at(all.len() - 4);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed = crc32(body);
    if stored != computed {
        return Err(MfError::corrupt_snapshot(
            path,
            format!("校验和错误: 期望 {stored:08x}, 实际 {computed:08x}"),
        ));
    }

    if &body[0..4] != FIELD_MAGIC {
        return Err(MfError::corrupt_snapshot(path, "魔数不符"));
    }
    let version = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    if version != FIELD_VERSION {
        return Err(MfError::corrupt_snapshot(path, format!("不支持的版本 {version}")));
    }

    let mut words = [0u64; 7];
    for (n, word) in words.iter_mut().enumerate() {
        let start = 8 + n * 8;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&body[start..start + 8]);
        *word = u64::from_le_bytes(buf);
    }
    let header = FieldHeader {
        iteration: words[0],
        nx: words[1] as usize,
        ny: words[2] as usize,
        nz: words[3] as usize,
        ioffset: words[4] as usize,
        joffset: words[5] as usize,
        koffset: words[6] as usize,
    };

    let payload = &body[HEADER_BYTES..];
    if payload.len() != header.len() * 8 {
        return Err(MfError::corrupt_snapshot(
            path,
            format!("数据长度 {} 字节, 头部声明 {} 个值", payload.len(), header.len()),
        ));
    }
    let data: Vec<f64> = bytemuck::pod_collect_to_vec(payload);
    Ok((header, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_foundation::ErrorKind as MfKind;

    fn header(iteration: u64) -> FieldHeader {
        FieldHeader {
            iteration,
            nx: 3,
            ny: 2,
            nz: 2,
            ioffset: 3,
            joffset: 0,
            koffset: 0,
        }
    }

    #[test]
    fn test_bit_identical_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.0000010.00001");
        let data: Vec<f64> = (0..12).map(|n| (n as f64 * 0.7).exp() - 1.0 / 3.0).collect();

        write_field(&path, &header(10), &data).unwrap();
        let (read_header, read_data) = read_field(&path).unwrap();

        assert_eq!(read_header, header(10));
        assert!(data.iter().zip(&read_data).all(|(a, b)| a.to_bits() == b.to_bits()));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_missing_file() {
        let err = read_field(Path::new("/nonexistent/u.0000000.00000")).unwrap_err();
        assert!(matches!(err, MfError::FileNotFound { .. }));
        assert_eq!(err.kind(), MfKind::Io);
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.0000000.00000");
        write_field(&path, &header(0), &[1.0; 12]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_BYTES + 3] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = read_field(&path).unwrap_err();
        assert!(matches!(err, MfError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_length_mismatch_rejected_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.0000000.00000");
        assert!(write_field(&path, &header(0), &[1.0; 5]).is_err());
    }
}
