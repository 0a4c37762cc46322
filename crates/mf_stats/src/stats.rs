// crates/mf_stats/src/stats.rs

//! 垂直廓线统计
//!
//! 每个变量逐层计算水平平均与二、三、四阶中心矩；
//! 非 w 变量另在半层（含上下壁面）计算通量：
//!
//! - 解析通量 `w'φ'`：w 插值到变量所在的水平位置，φ 插值到半层
//! - 扩散通量 `-ν ∂φ/∂z`
//! - 总通量为两者之和
//!
//! 每次统计只做两次全局归约：第一次得到平均值，第二次得到中心矩与通量。
//! 局部求和使用 Kahan 补偿，归约按进程编号顺序合并，进程数固定时结果确定。
//!
//! 平均值与中心矩所在的层：单元中心与 x/y 面变量为全层 `kstart..kend`，
//! w 为半层 `kstart..=kend`。

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use mf_config::StatsSection;
use mf_fields::{Field3d, FieldStore, Grid, Placement};
use mf_foundation::{KahanSum, MfError, MfResult};
use mf_io::paths::stats_path;
use mf_io::{StatsHeader, StatsRecord, StatsStore};
use mf_parallel::{Communicator, Subdomain};
use ndarray::Array3;
use tracing::{debug, info};

/// 统计量
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Moment {
    /// 水平平均
    Mean,
    /// 二阶中心矩
    M2,
    /// 三阶中心矩
    M3,
    /// 四阶中心矩
    M4,
    /// 解析通量
    FluxResolved,
    /// 扩散通量
    FluxDiffusive,
    /// 总通量
    FluxTotal,
}

impl Moment {
    /// 廓线名后缀
    pub fn suffix(&self) -> &'static str {
        match self {
            Moment::Mean => "mean",
            Moment::M2 => "2",
            Moment::M3 => "3",
            Moment::M4 => "4",
            Moment::FluxResolved => "w",
            Moment::FluxDiffusive => "diff",
            Moment::FluxTotal => "flux",
        }
    }

    const CENTRAL: [Moment; 3] = [Moment::M2, Moment::M3, Moment::M4];
    const FLUXES: [Moment; 3] = [Moment::FluxResolved, Moment::FluxDiffusive, Moment::FluxTotal];
}

/// 廓线键
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileKey {
    /// 变量名
    pub variable: String,
    /// 统计量
    pub moment: Moment,
}

impl ProfileKey {
    /// 创建
    pub fn new(variable: impl Into<String>, moment: Moment) -> Self {
        Self {
            variable: variable.into(),
            moment,
        }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.variable, self.moment.suffix())
    }
}

/// 廓线统计器
pub struct Stats {
    variables: Vec<String>,
    profiles: BTreeMap<ProfileKey, Vec<f64>>,
    store: Option<StatsStore>,
}

impl Stats {
    /// 分配廓线，根进程打开（或续写）统计文件
    ///
    /// `variables` 为空时统计全部预报变量；列出未知变量时返回配置错误。
    pub fn create(
        cfg: &StatsSection,
        simname: &str,
        grid: &Grid,
        fields: &FieldStore,
        start_iteration: u64,
        is_root: bool,
    ) -> MfResult<Self> {
        let variables = if cfg.variables.is_empty() {
            fields.prognostic_names()
        } else {
            cfg.variables.clone()
        };

        let sub = grid.sub;
        let mut profiles = BTreeMap::new();
        for name in &variables {
            let field = lookup(fields, name)?;
            let nlev = levels(field.placement, &sub).len();
            profiles.insert(ProfileKey::new(name.as_str(), Moment::Mean), vec![0.0; nlev]);
            for m in Moment::CENTRAL {
                profiles.insert(ProfileKey::new(name.as_str(), m), vec![0.0; nlev]);
            }
            if has_flux(field) {
                for m in Moment::FLUXES {
                    profiles.insert(ProfileKey::new(name.as_str(), m), vec![0.0; sub.kmax + 1]);
                }
            }
        }

        let store = if is_root && cfg.enabled {
            let header = StatsHeader {
                simname: simname.to_string(),
                z: grid.interior_z().to_vec(),
                zh: grid.interior_zh().to_vec(),
            };
            let path = stats_path(fields.datadir(), simname);
            let store = StatsStore::create(&path, &header, start_iteration)?;
            info!(
                "统计输出 {}: {} 个变量, {} 条廓线",
                store.path().display(),
                variables.len(),
                profiles.len()
            );
            Some(store)
        } else {
            None
        };

        Ok(Self {
            variables,
            profiles,
            store,
        })
    }

    /// 统计的变量
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// 全部廓线
    pub fn profiles(&self) -> &BTreeMap<ProfileKey, Vec<f64>> {
        &self.profiles
    }

    /// 单条廓线
    pub fn profile(&self, variable: &str, moment: Moment) -> Option<&[f64]> {
        self.profiles
            .get(&ProfileKey::new(variable, moment))
            .map(Vec::as_slice)
    }

    /// 计算一次统计并由根进程追加到统计文件
    ///
    /// 要求全部场的晕区已更新。所有进程必须同时调用。
    pub fn exec(
        &mut self,
        comm: &dyn Communicator,
        grid: &Grid,
        fields: &FieldStore,
        iteration: u64,
        time: f64,
    ) -> MfResult<()> {
        let sub = grid.sub;
        let n = grid.horizontal_cells();
        let w = &fields.w().data;
        let half = sub.kstart()..sub.kend() + 1;

        // 第一遍：平均值、半层插值平均、垂直梯度平均
        let mut local = Vec::new();
        for name in &self.variables {
            let field = lookup(fields, name)?;
            let f = &field.data;
            for k in levels(field.placement, &sub) {
                local.push(level_sum(&sub, |j, i| f[[k, j, i]]));
            }
            if has_flux(field) {
                for k in half.clone() {
                    local.push(level_sum(&sub, |j, i| 0.5 * (f[[k - 1, j, i]] + f[[k, j, i]])));
                    local.push(level_sum(&sub, |j, i| w_at(w, field.placement, k, j, i)));
                    local.push(level_sum(&sub, |j, i| f[[k, j, i]] - f[[k - 1, j, i]]));
                }
            }
        }
        let first: Vec<f64> = comm.all_reduce_sum_vec(&local)?.into_iter().map(|v| v / n).collect();

        // 第二遍：中心矩与解析通量
        let mut cursor = first.iter().copied();
        let mut means = Vec::with_capacity(self.variables.len());
        local.clear();
        for name in &self.variables {
            let field = lookup(fields, name)?;
            let f = &field.data;
            let lev = levels(field.placement, &sub);
            let mean: Vec<f64> = take(&mut cursor, lev.len())?;
            for (&m, k) in mean.iter().zip(lev.clone()) {
                local.push(level_sum(&sub, |j, i| (f[[k, j, i]] - m).powi(2)));
                local.push(level_sum(&sub, |j, i| (f[[k, j, i]] - m).powi(3)));
                local.push(level_sum(&sub, |j, i| (f[[k, j, i]] - m).powi(4)));
            }
            let mut face = Vec::new();
            if has_flux(field) {
                for k in half.clone() {
                    let fm = next(&mut cursor)?;
                    let wm = next(&mut cursor)?;
                    let grad = next(&mut cursor)?;
                    local.push(level_sum(&sub, |j, i| {
                        let phi = 0.5 * (f[[k - 1, j, i]] + f[[k, j, i]]);
                        (w_at(w, field.placement, k, j, i) - wm) * (phi - fm)
                    }));
                    face.push(-field.visc * grad * grid.dzhi[k]);
                }
            }
            means.push((mean, face));
        }
        let second: Vec<f64> = comm.all_reduce_sum_vec(&local)?.into_iter().map(|v| v / n).collect();

        let mut cursor = second.iter().copied();
        for (name, (mean, diffusive)) in self.variables.iter().zip(means) {
            let nlev = mean.len();
            let mut central = [vec![0.0; nlev], vec![0.0; nlev], vec![0.0; nlev]];
            for k in 0..nlev {
                for c in &mut central {
                    c[k] = next(&mut cursor)?;
                }
            }
            let profiles = &mut self.profiles;
            assign(profiles, name, Moment::Mean, mean);
            for (m, values) in Moment::CENTRAL.into_iter().zip(central) {
                assign(profiles, name, m, values);
            }
            if !diffusive.is_empty() {
                let resolved = take(&mut cursor, diffusive.len())?;
                let total = resolved.iter().zip(&diffusive).map(|(r, d)| r + d).collect();
                assign(profiles, name, Moment::FluxResolved, resolved);
                assign(profiles, name, Moment::FluxDiffusive, diffusive);
                assign(profiles, name, Moment::FluxTotal, total);
            }
        }

        if let Some(store) = &mut self.store {
            let record = StatsRecord {
                iteration,
                time,
                profiles: self
                    .profiles
                    .iter()
                    .map(|(key, values)| (key.to_string(), values.clone()))
                    .collect(),
            };
            store.append(&record)?;
        }
        debug!("迭代步 {iteration} 统计完成");
        Ok(())
    }
}

fn assign(profiles: &mut BTreeMap<ProfileKey, Vec<f64>>, variable: &str, moment: Moment, values: Vec<f64>) {
    if let Some(slot) = profiles.get_mut(&ProfileKey::new(variable, moment)) {
        // 长度在创建时已定
        for (dst, v) in slot.iter_mut().zip(values) {
            *dst = v;
        }
    }
}

fn lookup<'a>(fields: &'a FieldStore, name: &str) -> MfResult<&'a Field3d> {
    fields
        .get(name)
        .ok_or_else(|| MfError::config(format!("stats.variables: 未知变量 '{name}'")))
}

fn has_flux(field: &Field3d) -> bool {
    field.placement != Placement::FaceZ
}

fn levels(placement: Placement, sub: &Subdomain) -> Range<usize> {
    match placement {
        Placement::FaceZ => sub.kstart()..sub.kend() + 1,
        _ => sub.kstart()..sub.kend(),
    }
}

/// w 插值到变量所在的水平位置
fn w_at(w: &Array3<f64>, placement: Placement, k: usize, j: usize, i: usize) -> f64 {
    match placement {
        Placement::FaceX => 0.5 * (w[[k, j, i - 1]] + w[[k, j, i]]),
        Placement::FaceY => 0.5 * (w[[k, j - 1, i]] + w[[k, j, i]]),
        _ => w[[k, j, i]],
    }
}

fn level_sum(sub: &Subdomain, value: impl Fn(usize, usize) -> f64) -> f64 {
    let value = &value;
    (sub.jstart()..sub.jend())
        .flat_map(|j| (sub.istart()..sub.iend()).map(move |i| value(j, i)))
        .collect::<KahanSum>()
        .value()
}

fn next(cursor: &mut impl Iterator<Item = f64>) -> MfResult<f64> {
    cursor
        .next()
        .ok_or_else(|| MfError::protocol("统计归约结果长度不足"))
}

fn take(cursor: &mut impl Iterator<Item = f64>, n: usize) -> MfResult<Vec<f64>> {
    (0..n).map(|_| next(cursor)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_config::FieldsSection;
    use mf_fields::{FIRST_SCALAR, U, W};
    use mf_parallel::{partition, GlobalExtent, HaloWidth, ThreadWorld, Topology};

    fn setup(datadir: &std::path::Path) -> (Grid, FieldStore) {
        let topo = Topology::new(1, 0, 1, 1, true, true).unwrap();
        let extent = GlobalExtent::new(4, 2, 2);
        let sub = partition(&topo, extent, HaloWidth::uniform(1)).unwrap();
        let grid = Grid::from_parts(extent, sub, [1.0, 1.0, 1.0], None).unwrap();
        let cfg = FieldsSection {
            scalars: vec!["s".into()],
            visc: 0.1,
            viscs: 0.1,
            datadir: datadir.to_path_buf(),
            ..Default::default()
        };
        let fields = FieldStore::new(&cfg, &grid);
        (grid, fields)
    }

    #[test]
    fn test_profile_key_names() {
        assert_eq!(ProfileKey::new("u", Moment::Mean).to_string(), "u.mean");
        assert_eq!(ProfileKey::new("s", Moment::FluxTotal).to_string(), "s.flux");
    }

    #[test]
    fn test_uniform_fields() {
        let dir = tempfile::tempdir().unwrap();
        let out = ThreadWorld::run(1, |comm| {
            let (grid, mut fields) = setup(dir.path());
            fields.prog[U].fill(1.0);
            let mut stats = Stats::create(&StatsSection::default(), "sim", &grid, &fields, 0, true)?;
            stats.exec(comm, &grid, &fields, 0, 0.0)?;
            Ok((
                stats.profile("u", Moment::Mean).map(<[f64]>::to_vec),
                stats.profile("u", Moment::M2).map(<[f64]>::to_vec),
                stats.profile("w", Moment::Mean).map(<[f64]>::to_vec),
                stats.profile("w", Moment::FluxTotal).is_none(),
            ))
        })
        .unwrap();
        let (umean, u2, wmean, w_no_flux) = out[0].clone();
        assert_eq!(umean.unwrap(), vec![1.0, 1.0]);
        assert_eq!(u2.unwrap(), vec![0.0, 0.0]);
        assert_eq!(wmean.unwrap().len(), 3);
        assert!(w_no_flux);

        let (_, records) = StatsStore::read(&stats_path(dir.path(), "sim")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].profiles["u.mean"], vec![1.0, 1.0]);
    }

    #[test]
    fn test_linear_scalar_diffusive_flux() {
        let dir = tempfile::tempdir().unwrap();
        let out = ThreadWorld::run(1, |comm| {
            let (grid, mut fields) = setup(dir.path());
            let sub = grid.sub;
            // 含虚拟层的线性廓线 s = 2z
            let s = &mut fields.prog[FIRST_SCALAR].data;
            for k in 0..sub.kcells() {
                s.slice_mut(ndarray::s![k, .., ..]).fill(2.0 * grid.z[k]);
            }
            // w 与 s 同相的扰动产生正的解析通量
            let ks = sub.kstart();
            let (j, i) = (sub.jstart(), sub.istart());
            fields.prog[W].data[[ks + 1, j, i]] = 1.0;
            fields.prog[FIRST_SCALAR].data[[ks, j, i]] += 0.5;
            fields.prog[FIRST_SCALAR].data[[ks + 1, j, i]] += 0.5;

            let mut stats = Stats::create(&StatsSection::default(), "sim", &grid, &fields, 0, false)?;
            stats.exec(comm, &grid, &fields, 0, 0.0)?;
            Ok((
                stats.profile("s", Moment::FluxDiffusive).map(<[f64]>::to_vec),
                stats.profile("s", Moment::FluxResolved).map(<[f64]>::to_vec),
            ))
        })
        .unwrap();
        let (diff, resolved) = out[0].clone();
        let diff = diff.unwrap();
        assert_eq!(diff.len(), 3);
        // 中层梯度 2 加上扰动不改变均值差
        assert!((diff[1] + 0.1 * 2.0).abs() < 1e-12);
        let resolved = resolved.unwrap();
        assert_eq!(resolved[0], 0.0);
        assert!(resolved[1] > 0.0);
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let (grid, fields) = setup(std::path::Path::new("."));
        let cfg = StatsSection {
            variables: vec!["q".into()],
            ..Default::default()
        };
        assert!(Stats::create(&cfg, "sim", &grid, &fields, 0, false).is_err());
    }
}
