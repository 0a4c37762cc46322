// crates/mf_physics/tests/projection.rs

//! 压力投影测试
//!
//! 光滑的非无散速度场经一次投影后散度降到容差以下，
//! 且压力解与进程分解无关。

use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mf_config::{BoundarySection, FieldsSection, MomentumBc, PresSection};
use mf_fields::{FieldStore, Grid, U, V, W};
use mf_foundation::{MfError, MfResult};
use mf_parallel::{partition, Communicator, GlobalExtent, HaloWidth, ThreadComm, ThreadWorld, Topology};
use mf_physics::{Boundary, ColumnSolver, Pressure};

const EXTENT: (usize, usize, usize) = (8, 6, 5);
const STRETCHED: [f64; 5] = [0.05, 0.15, 0.3, 0.5, 0.75];

struct Outcome {
    before: f64,
    after: f64,
    residual: f64,
    converged: bool,
    /// (全局 i, 全局 j, k, p)
    pressure: Vec<(usize, usize, usize, f64)>,
}

fn setup(comm: &ThreadComm, npx: usize, npy: usize, zlist: Option<&[f64]>) -> MfResult<(Topology, Grid, FieldStore, Boundary)> {
    let topo = Topology::new(comm.size(), comm.rank(), npx, npy, true, true)?;
    let extent = GlobalExtent::new(EXTENT.0, EXTENT.1, EXTENT.2);
    let sub = partition(&topo, extent, HaloWidth::uniform(1))?;
    let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], zlist)?;
    let mut fields = FieldStore::new(&FieldsSection::default(), &grid);

    for k in sub.kstart()..sub.kend() {
        for j in sub.jstart()..sub.jend() {
            for i in sub.istart()..sub.iend() {
                fields.prog[U].data[[k, j, i]] =
                    (2.0 * PI * grid.y[j]).sin() + 0.3 * (2.0 * PI * grid.xh[i]).cos() * grid.z[k];
                fields.prog[V].data[[k, j, i]] = (2.0 * PI * grid.x[i]).cos() * (2.0 * PI * grid.z[k]).sin()
                    + 0.2 * (2.0 * PI * grid.yh[j]).sin();
                fields.prog[W].data[[k, j, i]] =
                    0.5 * (2.0 * PI * grid.x[i]).sin() * (2.0 * PI * grid.y[j]).cos() * (PI * grid.zh[k]).sin();
            }
        }
    }

    let bc = BoundarySection {
        mbcbot: MomentumBc::FreeSlip,
        ..Default::default()
    };
    let boundary = Boundary::new(&bc, &topo, &grid);
    boundary.apply(comm, &grid, &mut fields)?;
    Ok((topo, grid, fields, boundary))
}

fn project(npx: usize, npy: usize, zlist: Option<&'static [f64]>) -> Vec<Outcome> {
    ThreadWorld::run(npx * npy, |comm| {
        let (topo, grid, mut fields, boundary) = setup(comm, npx, npy, zlist)?;
        let mut pres = Pressure::new(&PresSection::default(), &topo, &grid)?;
        pres.setvalues(&grid)?;

        let subdt = 0.5;
        let before = pres.check(comm, &grid, &fields)?;
        let report = pres.exec(comm, &grid, &mut fields, subdt)?;

        // 用修正后的倾向项推进一个子步
        let sub = grid.sub;
        for n in [U, V, W] {
            let tend = fields.tend[n].data.clone();
            let field = &mut fields.prog[n].data;
            for k in sub.kstart()..sub.kend() {
                for j in sub.jstart()..sub.jend() {
                    for i in sub.istart()..sub.iend() {
                        field[[k, j, i]] += subdt * tend[[k, j, i]];
                    }
                }
            }
        }
        boundary.apply(comm, &grid, &mut fields)?;
        let after = pres.check(comm, &grid, &fields)?;

        let mut pressure = Vec::new();
        for k in sub.kstart()..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    let gi = sub.ioffset + i - sub.istart();
                    let gj = sub.joffset + j - sub.jstart();
                    pressure.push((gi, gj, k - sub.kstart(), fields.p.data[[k, j, i]]));
                }
            }
        }
        Ok(Outcome {
            before,
            after,
            residual: report.residual,
            converged: report.converged(),
            pressure,
        })
    })
    .unwrap()
}

fn global_pressure(outcomes: &[Outcome]) -> Vec<f64> {
    let (itot, jtot, ktot) = EXTENT;
    let mut p = vec![f64::NAN; itot * jtot * ktot];
    for outcome in outcomes {
        for &(i, j, k, value) in &outcome.pressure {
            p[(k * jtot + j) * itot + i] = value;
        }
    }
    p
}

/// 测试投影后散度低于容差且严格下降
#[test]
fn test_projection_removes_divergence() {
    let tolerance = PresSection::default().tolerance;
    for outcome in project(1, 1, None) {
        assert!(outcome.before > 1e-2, "初始散度应明显非零: {}", outcome.before);
        assert!(outcome.converged, "残差 {}", outcome.residual);
        assert!(outcome.after < tolerance, "投影后散度 {}", outcome.after);
        assert!(outcome.after < outcome.before);
    }
}

/// 测试拉伸垂直网格上的投影
#[test]
fn test_projection_on_stretched_grid() {
    let tolerance = PresSection::default().tolerance;
    for outcome in project(1, 1, Some(&STRETCHED[..])) {
        assert!(outcome.converged, "残差 {}", outcome.residual);
        assert!(outcome.after < tolerance);
    }
}

/// 测试压力解与进程分解无关
#[test]
fn test_pressure_independent_of_decomposition() {
    let serial = global_pressure(&project(1, 1, None));
    for (npx, npy) in [(2, 1), (1, 2), (2, 2)] {
        let outcomes = project(npx, npy, None);
        let first = outcomes[0].after;
        for outcome in &outcomes {
            assert!(outcome.converged);
            assert_eq!(outcome.after, first, "全组散度应一致");
        }
        let parallel = global_pressure(&outcomes);
        for (a, b) in serial.iter().zip(&parallel) {
            assert!((a - b).abs() < 1e-10, "{npx}x{npy}: {a} vs {b}");
        }
    }
}

/// 带部分主元的稠密消元，记录调用次数
struct DenseSolver {
    calls: Arc<AtomicUsize>,
}

impl ColumnSolver for DenseSolver {
    fn solve(&self, a: &[f64], b: &[f64], c: &[f64], d: &mut [f64]) -> MfResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let n = d.len();
        let mut m = vec![vec![0.0; n + 1]; n];
        for k in 0..n {
            m[k][k] = b[k];
            if k > 0 {
                m[k][k - 1] = a[k];
            }
            if k + 1 < n {
                m[k][k + 1] = c[k];
            }
            m[k][n] = d[k];
        }
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| m[x][col].abs().total_cmp(&m[y][col].abs()))
                .unwrap_or(col);
            m.swap(col, pivot);
            let row0 = m[col].clone();
            if row0[col] == 0.0 {
                return Err(MfError::numerical("稠密消元主元", 0.0, 0.0));
            }
            for row in m.iter_mut().skip(col + 1) {
                let f = row[col] / row0[col];
                for (x, &y) in row.iter_mut().zip(&row0).skip(col) {
                    *x -= f * y;
                }
            }
        }
        for k in (0..n).rev() {
            let mut v = m[k][n];
            for j in k + 1..n {
                v -= m[k][j] * d[j];
            }
            d[k] = v / m[k][k];
        }
        Ok(())
    }
}

/// 测试替换列求解器后投影仍收敛到容差以内
#[test]
fn test_projection_with_replaced_column_solver() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reports = ThreadWorld::run(2, |comm| {
        let (topo, grid, mut fields, _) = setup(comm, 2, 1, None)?;
        let solver = DenseSolver {
            calls: Arc::clone(&calls),
        };
        let mut pres = Pressure::new(&PresSection::default(), &topo, &grid)?.with_solver(Box::new(solver));
        pres.setvalues(&grid)?;
        pres.exec(comm, &grid, &mut fields, 0.5)
    })
    .unwrap();

    assert!(calls.load(Ordering::Relaxed) > 0);
    for report in reports {
        assert!(report.converged(), "残差 {}", report.residual);
        assert!(report.residual < report.tolerance);
    }
}
