// crates/mf_config/src/sections/parallel.rs

//! 进程网格与计算网格配置

use serde::{Deserialize, Serialize};

use super::require_positive;
use crate::error::ConfigError;
use crate::source::ConfigSection;

/// 进程网格配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MpiSection {
    /// x 方向进程数
    #[serde(default = "default_nprocs")]
    pub npx: usize,

    /// y 方向进程数
    #[serde(default = "default_nprocs")]
    pub npy: usize,
}

fn default_nprocs() -> usize { 1 }

impl Default for MpiSection {
    fn default() -> Self {
        Self {
            npx: default_nprocs(),
            npy: default_nprocs(),
        }
    }
}

impl MpiSection {
    /// 进程总数
    pub fn size(&self) -> usize {
        self.npx * self.npy
    }
}

impl ConfigSection for MpiSection {
    const NAME: &'static str = "mpi";

    fn validate(&self) -> Result<(), ConfigError> {
        if self.npx == 0 {
            return Err(ConfigError::invalid("mpi.npx", self.npx, "至少为 1"));
        }
        if self.npy == 0 {
            return Err(ConfigError::invalid("mpi.npy", self.npy, "至少为 1"));
        }
        Ok(())
    }
}

/// 计算网格配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSection {
    /// x 方向全局网格数
    #[serde(default = "default_cells")]
    pub itot: usize,
    /// y 方向全局网格数
    #[serde(default = "default_cells")]
    pub jtot: usize,
    /// z 方向全局网格数
    #[serde(default = "default_cells")]
    pub ktot: usize,

    /// x 方向区域长度 [m]
    #[serde(default = "default_size")]
    pub xsize: f64,
    /// y 方向区域长度 [m]
    #[serde(default = "default_size")]
    pub ysize: f64,
    /// z 方向区域高度 [m]
    #[serde(default = "default_size")]
    pub zsize: f64,

    /// 非均匀垂直网格的单元中心高度（长度为 ktot），缺省为均匀网格
    #[serde(default)]
    pub z: Option<Vec<f64>>,

    /// x 方向晕区宽度
    #[serde(default = "default_halo")]
    pub igc: usize,
    /// y 方向晕区宽度
    #[serde(default = "default_halo")]
    pub jgc: usize,
    /// z 方向虚拟层数
    #[serde(default = "default_halo")]
    pub kgc: usize,

    /// x 方向周期
    #[serde(default = "default_periodic")]
    pub periodic_x: bool,
    /// y 方向周期
    #[serde(default = "default_periodic")]
    pub periodic_y: bool,
}

fn default_cells() -> usize { 8 }
fn default_size() -> f64 { 1.0 }
fn default_halo() -> usize { 1 }
fn default_periodic() -> bool { true }

impl Default for GridSection {
    fn default() -> Self {
        Self {
            itot: default_cells(),
            jtot: default_cells(),
            ktot: default_cells(),
            xsize: default_size(),
            ysize: default_size(),
            zsize: default_size(),
            z: None,
            igc: default_halo(),
            jgc: default_halo(),
            kgc: default_halo(),
            periodic_x: default_periodic(),
            periodic_y: default_periodic(),
        }
    }
}

impl ConfigSection for GridSection {
    const NAME: &'static str = "grid";

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, n) in [("grid.itot", self.itot), ("grid.jtot", self.jtot), ("grid.ktot", self.ktot)] {
            if n == 0 {
                return Err(ConfigError::invalid(key, n, "至少为 1"));
            }
        }
        require_positive("grid.xsize", self.xsize)?;
        require_positive("grid.ysize", self.ysize)?;
        require_positive("grid.zsize", self.zsize)?;

        for (key, n) in [("grid.igc", self.igc), ("grid.jgc", self.jgc), ("grid.kgc", self.kgc)] {
            if n == 0 {
                return Err(ConfigError::invalid(key, n, "晕区宽度至少为 1"));
            }
        }

        if let Some(z) = &self.z {
            if z.len() != self.ktot {
                return Err(ConfigError::invalid(
                    "grid.z",
                    z.len(),
                    format!("高度个数必须等于 ktot={}", self.ktot),
                ));
            }
            let mut prev = 0.0;
            for &zk in z {
                if !(zk > prev && zk < self.zsize) {
                    return Err(ConfigError::invalid(
                        "grid.z",
                        zk,
                        "高度必须严格递增且位于 (0, zsize) 内",
                    ));
                }
                prev = zk;
            }
        }
        Ok(())
    }
}
