// crates/mf_fields/src/field.rs

//! 三维交错场

use mf_foundation::{MfError, MfResult};
use mf_parallel::Subdomain;
use ndarray::{s, Array3, ArrayView3};

/// 变量在网格单元上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// 单元中心
    Center,
    /// x 方向面（u）
    FaceX,
    /// y 方向面（v）
    FaceY,
    /// z 方向面（w）
    FaceZ,
}

/// 含晕区的三维场，按 `[k, j, i]` 存储
#[derive(Debug, Clone)]
pub struct Field3d {
    /// 名称
    pub name: String,
    /// 位置
    pub placement: Placement,
    /// 分子粘性或扩散系数
    pub visc: f64,
    /// 数据
    pub data: Array3<f64>,
}

impl Field3d {
    /// 创建全零场
    pub fn new(name: impl Into<String>, placement: Placement, visc: f64, sub: &Subdomain) -> Self {
        Self {
            name: name.into(),
            placement,
            visc,
            data: Array3::zeros(sub.shape()),
        }
    }

    /// 内部区域视图
    pub fn interior(&self, sub: &Subdomain) -> ArrayView3<'_, f64> {
        self.data
            .slice(s![sub.kstart()..sub.kend(), sub.jstart()..sub.jend(), sub.istart()..sub.iend()])
    }

    /// 内部数据，按 `[k][j][i]` 展平
    pub fn interior_values(&self, sub: &Subdomain) -> Vec<f64> {
        self.interior(sub).iter().copied().collect()
    }

    /// 用展平的数据覆盖内部区域
    pub fn set_interior(&mut self, sub: &Subdomain, values: &[f64]) -> MfResult<()> {
        let mut view = self
            .data
            .slice_mut(s![sub.kstart()..sub.kend(), sub.jstart()..sub.jend(), sub.istart()..sub.iend()]);
        MfError::check_len(&format!("场 {} 内部数据", self.name), view.len(), values.len())?;
        for (dst, &src) in view.iter_mut().zip(values) {
            *dst = src;
        }
        Ok(())
    }

    /// 全部网格置为同一值
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }
}
