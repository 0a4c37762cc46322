// crates/mf_physics/src/pressure/tridiag.rs

//! 三对角列求解

use mf_foundation::{MfError, MfResult};

/// 单列三对角方程组求解器
///
/// `a` 为下对角（`a[0]` 不使用），`b` 为主对角，`c` 为上对角（`c[n-1]` 不使用），
/// 解写回 `d`。
pub trait ColumnSolver: Send + Sync {
    /// 求解
    fn solve(&self, a: &[f64], b: &[f64], c: &[f64], d: &mut [f64]) -> MfResult<()>;
}

/// Thomas 追赶法
#[derive(Debug, Default, Clone, Copy)]
pub struct ThomasSolver;

impl ColumnSolver for ThomasSolver {
    fn solve(&self, a: &[f64], b: &[f64], c: &[f64], d: &mut [f64]) -> MfResult<()> {
        let n = d.len();
        MfError::check_len("三对角下对角", n, a.len())?;
        MfError::check_len("三对角主对角", n, b.len())?;
        MfError::check_len("三对角上对角", n, c.len())?;
        if n == 0 {
            return Ok(());
        }

        let mut cp = vec![0.0; n];
        let mut pivot = b[0];
        if pivot == 0.0 {
            return Err(MfError::numerical("三对角主元", pivot, 0.0));
        }
        cp[0] = c[0] / pivot;
        d[0] /= pivot;
        for k in 1..n {
            pivot = b[k] - a[k] * cp[k - 1];
            if pivot == 0.0 {
                return Err(MfError::numerical("三对角主元", pivot, 0.0));
            }
            cp[k] = c[k] / pivot;
            d[k] = (d[k] - a[k] * d[k - 1]) / pivot;
        }
        for k in (0..n - 1).rev() {
            d[k] -= cp[k] * d[k + 1];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thomas_matches_known_solution() {
        // [2 1 0; 1 2 1; 0 1 2] x = [4 8 8]  ->  x = [1 2 3]
        let a = [0.0, 1.0, 1.0];
        let b = [2.0, 2.0, 2.0];
        let c = [1.0, 1.0, 0.0];
        let mut d = [4.0, 8.0, 8.0];
        ThomasSolver.solve(&a, &b, &c, &mut d).unwrap();
        for (x, e) in d.iter().zip([1.0, 2.0, 3.0]) {
            assert!((x - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_pivot_is_numerical_error() {
        let mut d = [1.0, 1.0];
        let err = ThomasSolver
            .solve(&[0.0, 1.0], &[0.0, 1.0], &[1.0, 0.0], &mut d)
            .unwrap_err();
        assert_eq!(err.kind(), mf_foundation::ErrorKind::Numerical);
    }
}
