// crates/mf_io/src/summary.rs

//! 逐步检查输出 `<simname>.out`
//!
//! 固定宽度列，科学计数法沿用 C 的 `%E` 写法（指数带符号且至少两位）。
//! 续算与重放追加到已有文件末尾，表头只在新文件中写一次。

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;

use mf_foundation::{MfError, MfResult};

/// 一行检查输出
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryLine {
    /// 迭代步
    pub iteration: u64,
    /// 模拟时间
    pub time: f64,
    /// 距上次检查的墙钟时间 [s]
    pub cpudt: f64,
    /// 时间步长
    pub dt: f64,
    /// Courant 数
    pub cfl: f64,
    /// 扩散数
    pub dnum: f64,
    /// 最大散度
    pub div: f64,
    /// 动量
    pub mom: f64,
    /// 湍动能
    pub tke: f64,
    /// 标量质量
    pub mass: f64,
}

impl SummaryLine {
    /// 格式化为固定宽度文本（不含换行）
    pub fn format(&self) -> String {
        format!(
            "{:8} {} {:10.4} {} {:8.4} {:8.4} {} {} {} {}",
            self.iteration,
            format_exp(self.time, 11, 3),
            self.cpudt,
            format_exp(self.dt, 11, 3),
            self.cfl,
            self.dnum,
            format_exp(self.div, 11, 3),
            format_exp(self.mom, 16, 8),
            format_exp(self.tke, 16, 8),
            format_exp(self.mass, 16, 8),
        )
    }
}

/// 表头
pub fn header_line() -> String {
    format!(
        "{:>8} {:>11} {:>10} {:>11} {:>8} {:>8} {:>11} {:>16} {:>16} {:>16}",
        "ITER", "TIME", "CPUDT", "DT", "CFL", "DNUM", "DIV", "MOM", "TKE", "MASS"
    )
}

/// C 风格 `%<width>.<precision>E`
pub fn format_exp(value: f64, width: usize, precision: usize) -> String {
    if !value.is_finite() {
        let text = if value.is_nan() {
            "NAN"
        } else if value > 0.0 {
            "INF"
        } else {
            "-INF"
        };
        return format!("{text:>width$}");
    }

    let raw = format!("{value:.precision$E}");
    let text = match raw.split_once('E') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exp.abs())
        }
        None => raw,
    };
    format!("{text:>width$}")
}

/// 检查输出写出器（行缓冲，仅根进程持有）
pub struct SummaryWriter {
    writer: LineWriter<File>,
}

impl SummaryWriter {
    /// 以追加方式打开，新文件先写表头
    pub fn open(path: &Path) -> MfResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MfError::io_with_source(format!("无法打开 {}", path.display()), e))?;
        let fresh = file.metadata()?.len() == 0;
        let mut writer = LineWriter::new(file);
        if fresh {
            writeln!(writer, "{}", header_line())?;
        }
        Ok(Self { writer })
    }

    /// 追加一行
    pub fn write(&mut self, line: &SummaryLine) -> MfResult<()> {
        writeln!(self.writer, "{}", line.format())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_exp_matches_c() {
        assert_eq!(format_exp(1234.4, 11, 3), "  1.234E+03");
        assert_eq!(format_exp(0.0, 11, 3), "  0.000E+00");
        assert_eq!(format_exp(-2.5e-7, 11, 3), " -2.500E-07");
        assert_eq!(format_exp(1.0, 16, 8), "  1.00000000E+00");
        assert_eq!(format_exp(6.02e123, 11, 3), " 6.020E+123");
        assert_eq!(format_exp(f64::NAN, 11, 3), "        NAN");
    }

    #[test]
    fn test_line_columns() {
        let line = SummaryLine {
            iteration: 42,
            time: 1.5,
            cpudt: 0.25,
            dt: 0.01,
            cfl: 0.8,
            dnum: 0.1,
            div: 1e-14,
            mom: 1.0,
            tke: 0.5,
            mass: 0.0,
        };
        let text = line.format();
        assert!(text.starts_with("      42   1.500E+00     0.2500"));
        assert_eq!(text.len(), header_line().len());
    }

    fn line(iteration: u64) -> SummaryLine {
        SummaryLine {
            iteration,
            time: 0.0,
            cpudt: 0.0,
            dt: 0.1,
            cfl: 0.0,
            dnum: 0.0,
            div: 0.0,
            mom: 0.0,
            tke: 0.0,
            mass: 0.0,
        }
    }

    #[test]
    fn test_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.out");
        let mut writer = SummaryWriter::open(&path).unwrap();
        writer.write(&line(0)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("    ITER"));
    }

    #[test]
    fn test_reopen_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.out");
        {
            let mut writer = SummaryWriter::open(&path).unwrap();
            writer.write(&line(0)).unwrap();
            writer.write(&line(1)).unwrap();
        }
        {
            let mut writer = SummaryWriter::open(&path).unwrap();
            writer.write(&line(2)).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.iter().filter(|l| l.trim_start().starts_with("ITER")).count(), 1);
        let iterations: Vec<&str> = lines[1..].iter().filter_map(|l| l.split_whitespace().next()).collect();
        assert_eq!(iterations, vec!["0", "1", "2"]);
    }
}
