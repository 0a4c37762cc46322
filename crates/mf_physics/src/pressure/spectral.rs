// crates/mf_physics/src/pressure/spectral.rs

//! 实数离散 Fourier 变换（halfcomplex 存储）
//!
//! 正变换后位置 `p ≤ n/2` 存放第 `p` 个模态的实部，位置 `n - p` 存放其虚部。
//! 逆变换不归一化：`backward(forward(x)) = n · x`。
//! 位置 `p` 对应的波数为 `p`（`p ≤ n/2`）或 `n - p`。

use std::f64::consts::PI;

use mf_foundation::{MfError, MfResult};
use ndarray::{Array3, Axis};

/// 长度固定的实数 DFT
///
/// 直接查表求和，每条线 O(n²)，长度不限于 2 的幂。
/// 水平方向超过数百个网格时应换成 FFT。
#[derive(Debug, Clone)]
pub struct RealDft {
    n: usize,
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl RealDft {
    /// 预计算三角函数表
    pub fn new(n: usize) -> Self {
        let theta = |m: usize| 2.0 * PI * m as f64 / n as f64;
        Self {
            n,
            cos: (0..n).map(|m| theta(m).cos()).collect(),
            sin: (0..n).map(|m| theta(m).sin()).collect(),
        }
    }

    /// 变换长度
    pub fn len(&self) -> usize {
        self.n
    }

    /// 长度是否为零
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// 位置 `p` 的波数
    pub fn wavenumber(&self, p: usize) -> usize {
        if p <= self.n / 2 {
            p
        } else {
            self.n - p
        }
    }

    /// 二阶中心差分在位置 `p` 上的特征值
    pub fn eigenvalue(&self, p: usize, dxi: f64) -> f64 {
        let kk = self.wavenumber(p);
        2.0 * (self.cos[kk] - 1.0) * dxi * dxi
    }

    /// 正变换
    pub fn forward(&self, input: &[f64], out: &mut [f64]) {
        let n = self.n;
        for k in 0..=n / 2 {
            let (mut re, mut im) = (0.0, 0.0);
            for (j, &x) in input.iter().enumerate() {
                let m = (j * k) % n;
                re += x * self.cos[m];
                im -= x * self.sin[m];
            }
            out[k] = re;
            if k > 0 && 2 * k < n {
                out[n - k] = im;
            }
        }
    }

    /// 逆变换（未归一化）
    pub fn backward(&self, input: &[f64], out: &mut [f64]) {
        let n = self.n;
        for (j, x) in out.iter_mut().enumerate() {
            let mut v = input[0];
            for k in 1..=n / 2 {
                let m = (j * k) % n;
                if 2 * k == n {
                    v += input[k] * self.cos[m];
                } else {
                    v += 2.0 * (input[k] * self.cos[m] - input[n - k] * self.sin[m]);
                }
            }
            *x = v;
        }
    }

    /// 沿给定轴对每一条线做变换
    pub fn transform_lanes(&self, data: &mut Array3<f64>, axis: usize, inverse: bool) -> MfResult<()> {
        MfError::check_len("变换轴长度", self.n, data.len_of(Axis(axis)))?;
        let mut scratch = vec![0.0; self.n];
        let mut line = vec![0.0; self.n];
        for mut lane in data.lanes_mut(Axis(axis)) {
            for (dst, &src) in line.iter_mut().zip(lane.iter()) {
                *dst = src;
            }
            if inverse {
                self.backward(&line, &mut scratch);
            } else {
                self.forward(&line, &mut scratch);
            }
            for (dst, &src) in lane.iter_mut().zip(&scratch) {
                *dst = src;
            }
        }
        Ok(())
    }
}
