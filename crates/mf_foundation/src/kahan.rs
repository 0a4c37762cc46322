// crates/mf_foundation/src/kahan.rs

//! 补偿求和
//!
//! 统计与检查量先在本进程内部网格上求局部和，再按进程编号顺序合并。
//! 两步都用 Neumaier 形式的补偿求和：加数量级大于当前和时仍能保留低位，
//! 因此跨进程合并时各部分和的大小差异不会吞掉小的部分。

/// 补偿求和器
///
/// # 示例
///
/// ```rust
/// use mf_foundation::KahanSum;
///
/// let sum: KahanSum = std::iter::repeat(0.1).take(10).collect();
/// assert!((sum.value() - 1.0).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// 空的求和器
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加一个值
    #[inline]
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    /// 并入另一个部分和，调用顺序决定舍入结果
    pub fn merge(&mut self, other: &KahanSum) {
        self.add(other.sum);
        self.add(other.compensation);
    }

    /// 补偿后的和
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl Extend<f64> for KahanSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for v in iter {
            self.add(v);
        }
    }
}

impl FromIterator<f64> for KahanSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = Self::new();
        sum.extend(iter);
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_tenths() {
        let sum: KahanSum = vec![0.1; 1000].into_iter().collect();
        assert!((sum.value() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_large_addend_keeps_small_parts() {
        let sum: KahanSum = [1.0, 1e100, 1.0, -1e100].into_iter().collect();
        assert_eq!(sum.value(), 2.0);
    }

    #[test]
    fn test_merge_partial_sums() {
        // 两个“进程”的局部和按编号顺序合并
        let mut first: KahanSum = [1e100, 1.0].into_iter().collect();
        let second: KahanSum = [1.0, -1e100].into_iter().collect();
        first.merge(&second);
        assert_eq!(first.value(), 2.0);
    }
}
