// crates/mf_fields/src/store.rs

//! 场存储
//!
//! 持有全部预报变量（u、v、w 及标量）、对应的倾向项与压力。
//! 预报变量与倾向项分别存放在两个平行的向量中，算子可以同时只读前者、改写后者。
//! 场一经创建不再改变尺寸。

use std::path::{Path, PathBuf};

use mf_config::FieldsSection;
use mf_foundation::{KahanSum, MfError, MfResult};
use mf_io::paths::field_path;
use mf_io::{read_field, write_field, FieldHeader};
use mf_parallel::{Communicator, Subdomain};
use tracing::debug;

use crate::field::{Field3d, Placement};
use crate::grid::Grid;

/// u 在预报变量中的位置
pub const U: usize = 0;
/// v 在预报变量中的位置
pub const V: usize = 1;
/// w 在预报变量中的位置
pub const W: usize = 2;
/// 首个标量的位置
pub const FIRST_SCALAR: usize = 3;

/// 场存储
#[derive(Debug, Clone)]
pub struct FieldStore {
    /// 预报变量：u、v、w、标量
    pub prog: Vec<Field3d>,
    /// 倾向项，与 `prog` 一一对应
    pub tend: Vec<Field3d>,
    /// 压力
    pub p: Field3d,
    sub: Subdomain,
    datadir: PathBuf,
}

impl FieldStore {
    /// 按配置分配全部场（初值为零）
    pub fn new(cfg: &FieldsSection, grid: &Grid) -> Self {
        let sub = grid.sub;
        let mut prog = vec![
            Field3d::new("u", Placement::FaceX, cfg.visc, &sub),
            Field3d::new("v", Placement::FaceY, cfg.visc, &sub),
            Field3d::new("w", Placement::FaceZ, cfg.visc, &sub),
        ];
        for name in &cfg.scalars {
            prog.push(Field3d::new(name.clone(), Placement::Center, cfg.viscs, &sub));
        }
        let tend = prog
            .iter()
            .map(|f| Field3d::new(format!("{}t", f.name), f.placement, f.visc, &sub))
            .collect();

        debug!("分配 {} 个预报变量, 形状 {:?}", prog.len(), sub.shape());
        Self {
            prog,
            tend,
            p: Field3d::new("p", Placement::Center, 0.0, &sub),
            sub,
            datadir: cfg.datadir.clone(),
        }
    }

    /// 子区域
    pub fn subdomain(&self) -> &Subdomain {
        &self.sub
    }

    /// 快照目录
    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// u
    pub fn u(&self) -> &Field3d {
        &self.prog[U]
    }

    /// v
    pub fn v(&self) -> &Field3d {
        &self.prog[V]
    }

    /// w
    pub fn w(&self) -> &Field3d {
        &self.prog[W]
    }

    /// 标量个数
    pub fn nscalars(&self) -> usize {
        self.prog.len() - FIRST_SCALAR
    }

    /// 预报变量名
    pub fn prognostic_names(&self) -> Vec<String> {
        self.prog.iter().map(|f| f.name.clone()).collect()
    }

    /// 预报变量的位置
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.prog.iter().position(|f| f.name == name)
    }

    /// 按名称取场（含压力）
    pub fn get(&self, name: &str) -> Option<&Field3d> {
        if name == self.p.name {
            return Some(&self.p);
        }
        self.index_of(name).map(|n| &self.prog[n])
    }

    /// 倾向项清零
    pub fn reset_tendencies(&mut self) {
        for t in &mut self.tend {
            t.fill(0.0);
        }
    }

    fn header(&self, iteration: u64) -> FieldHeader {
        FieldHeader {
            iteration,
            nx: self.sub.imax,
            ny: self.sub.jmax,
            nz: self.sub.kmax,
            ioffset: self.sub.ioffset,
            joffset: self.sub.joffset,
            koffset: 0,
        }
    }

    fn save_one(&self, field: &Field3d, iteration: u64, rank: usize) -> MfResult<()> {
        let path = field_path(&self.datadir, &field.name, iteration, rank);
        write_field(&path, &self.header(iteration), &field.interior_values(&self.sub))
    }

    /// 保存全部预报变量
    pub fn save(&self, iteration: u64, rank: usize) -> MfResult<()> {
        for field in &self.prog {
            self.save_one(field, iteration, rank)?;
        }
        debug!("进程 {rank} 保存迭代步 {iteration} 的 {} 个场", self.prog.len());
        Ok(())
    }

    /// 保存压力
    pub fn save_pressure(&self, iteration: u64, rank: usize) -> MfResult<()> {
        self.save_one(&self.p, iteration, rank)
    }

    /// 读取全部预报变量
    ///
    /// 快照缺失、损坏或与本子区域布局不符时返回 IO 错误。
    pub fn load(&mut self, iteration: u64, rank: usize) -> MfResult<()> {
        let expected = self.header(iteration);
        for n in 0..self.prog.len() {
            let path = field_path(&self.datadir, &self.prog[n].name, iteration, rank);
            let (header, values) = read_field(&path)?;
            if !header.same_layout(&expected) || header.iteration != iteration {
                return Err(MfError::corrupt_snapshot(
                    &path,
                    format!("布局 {header:?} 与子区域 {expected:?} 不符"),
                ));
            }
            self.prog[n].set_interior(&self.sub, &values)?;
        }
        debug!("进程 {rank} 读取迭代步 {iteration}");
        Ok(())
    }

    /// 动量检查量：`(u + v + w)` 的体积平均
    pub fn check_momentum(&self, comm: &dyn Communicator, grid: &Grid) -> MfResult<f64> {
        let sub = &self.sub;
        let (u, v, w) = (&self.u().data, &self.v().data, &self.w().data);
        let mut sum = KahanSum::new();
        for k in sub.kstart()..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    sum.add((u[[k, j, i]] + v[[k, j, i]] + w[[k, j, i]]) * grid.dz[k]);
                }
            }
        }
        Ok(comm.sum(sum.value())? / (grid.horizontal_cells() * grid.zsize))
    }

    /// 湍动能检查量：单元中心动能的体积平均
    ///
    /// 使用 `i+1`、`j+1`、`k+1` 处的面值，调用前晕区须已更新。
    pub fn check_tke(&self, comm: &dyn Communicator, grid: &Grid) -> MfResult<f64> {
        let sub = &self.sub;
        let (u, v, w) = (&self.u().data, &self.v().data, &self.w().data);
        let mut sum = KahanSum::new();
        for k in sub.kstart()..sub.kend() {
            for j in sub.jstart()..sub.jend() {
                for i in sub.istart()..sub.iend() {
                    let uc = 0.5 * (u[[k, j, i]] + u[[k, j, i + 1]]);
                    let vc = 0.5 * (v[[k, j, i]] + v[[k, j + 1, i]]);
                    let wc = 0.5 * (w[[k, j, i]] + w[[k + 1, j, i]]);
                    sum.add(0.5 * (uc * uc + vc * vc + wc * wc) * grid.dz[k]);
                }
            }
        }
        Ok(comm.sum(sum.value())? / (grid.horizontal_cells() * grid.zsize))
    }

    /// 质量检查量：首个标量的体积平均，无标量时为零
    pub fn check_mass(&self, comm: &dyn Communicator, grid: &Grid) -> MfResult<f64> {
        let local = match self.prog.get(FIRST_SCALAR) {
            Some(s) => {
                let sub = &self.sub;
                let mut sum = KahanSum::new();
                for k in sub.kstart()..sub.kend() {
                    for j in sub.jstart()..sub.jend() {
                        for i in sub.istart()..sub.iend() {
                            sum.add(s.data[[k, j, i]] * grid.dz[k]);
                        }
                    }
                }
                sum.value()
            }
            None => 0.0,
        };
        // 所有进程标量个数相同，归约调用次数一致
        Ok(comm.sum(local)? / (grid.horizontal_cells() * grid.zsize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_parallel::{partition, GlobalExtent, HaloWidth, ThreadWorld, Topology};

    fn setup(datadir: &Path, scalars: &[&str]) -> (Grid, FieldStore) {
        let topo = Topology::new(1, 0, 1, 1, true, true).unwrap();
        let extent = GlobalExtent::new(4, 2, 2);
        let sub = partition(&topo, extent, HaloWidth::uniform(1)).unwrap();
        let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], None).unwrap();
        let cfg = FieldsSection {
            scalars: scalars.iter().map(|s| s.to_string()).collect(),
            datadir: datadir.to_path_buf(),
            ..Default::default()
        };
        let fields = FieldStore::new(&cfg, &grid);
        (grid, fields)
    }

    #[test]
    fn test_names_and_lookup() {
        let (_, fields) = setup(Path::new("."), &["s", "th"]);
        assert_eq!(fields.prognostic_names(), vec!["u", "v", "w", "s", "th"]);
        assert_eq!(fields.nscalars(), 2);
        assert_eq!(fields.index_of("th"), Some(4));
        assert_eq!(fields.tend[4].name, "tht");
        assert!(fields.get("p").is_some());
        assert!(fields.get("q").is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut fields) = setup(dir.path(), &["s"]);
        let sub = *fields.subdomain();
        for (n, f) in fields.prog.iter_mut().enumerate() {
            let values: Vec<f64> = (0..sub.interior_cells()).map(|c| (c * 10 + n) as f64 / 7.0).collect();
            f.set_interior(&sub, &values).unwrap();
        }
        let before: Vec<Vec<f64>> = fields.prog.iter().map(|f| f.interior_values(&sub)).collect();

        fields.save(30, 0).unwrap();
        for f in &mut fields.prog {
            f.fill(0.0);
        }
        fields.load(30, 0).unwrap();

        let after: Vec<Vec<f64>> = fields.prog.iter().map(|f| f.interior_values(&sub)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_load_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut fields) = setup(dir.path(), &[]);
        let err = fields.load(90, 0).unwrap_err();
        assert_eq!(err.kind(), mf_foundation::ErrorKind::Io);
    }

    #[test]
    fn test_checks_for_uniform_flow() {
        let out = ThreadWorld::run(1, |comm| {
            let (grid, mut fields) = setup(Path::new("."), &["s"]);
            fields.prog[U].fill(2.0);
            fields.prog[FIRST_SCALAR].fill(0.5);
            Ok((
                fields.check_momentum(comm, &grid)?,
                fields.check_tke(comm, &grid)?,
                fields.check_mass(comm, &grid)?,
            ))
        })
        .unwrap();
        let (mom, tke, mass) = out[0];
        assert!((mom - 2.0).abs() < 1e-14);
        assert!((tke - 2.0).abs() < 1e-14);
        assert!((mass - 0.5).abs() < 1e-14);
    }
}
