// crates/mf_fields/src/init.rs

//! 初始场生成
//!
//! 均匀背景风 `(u0, v0)`，首个标量为线性廓线 `s0 + sgrad * z`，
//! 在 `rndz` 以下叠加 `[-rndamp, rndamp]` 的均匀随机扰动。
//! 各进程使用 `seed + rank` 作为种子，同一进程数下结果可复现。

use mf_config::InitSection;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::grid::Grid;
use crate::store::{FieldStore, FIRST_SCALAR, U, V, W};

/// 写入初始场（只改内部区域，晕区由边界条件填充）
pub fn apply_initial_state(cfg: &InitSection, grid: &Grid, fields: &mut FieldStore, rank: usize) {
    let sub = grid.sub;
    let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(rank as u64));
    let amp = cfg.rndamp;

    let mut perturb = |z: f64| -> f64 {
        if amp > 0.0 && z < cfg.rndz {
            rng.gen_range(-amp..=amp)
        } else {
            0.0
        }
    };

    for k in sub.kstart()..sub.kend() {
        for j in sub.jstart()..sub.jend() {
            for i in sub.istart()..sub.iend() {
                fields.prog[U].data[[k, j, i]] = cfg.u0 + perturb(grid.z[k]);
                fields.prog[V].data[[k, j, i]] = cfg.v0 + perturb(grid.z[k]);
                // 底面 w 恒为零
                fields.prog[W].data[[k, j, i]] = if k > sub.kstart() { perturb(grid.zh[k]) } else { 0.0 };
                if let Some(s) = fields.prog.get_mut(FIRST_SCALAR) {
                    s.data[[k, j, i]] = cfg.s0 + cfg.sgrad * grid.z[k] + perturb(grid.z[k]);
                }
            }
        }
    }
    for s in fields.prog.iter_mut().skip(FIRST_SCALAR + 1) {
        for k in sub.kstart()..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    s.data[[k, j, i]] = cfg.s0 + cfg.sgrad * grid.z[k];
                }
            }
        }
    }
    debug!("进程 {rank} 生成初始场, 种子 {}", cfg.seed.wrapping_add(rank as u64));
}
