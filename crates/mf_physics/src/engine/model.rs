// crates/mf_physics/src/engine/model.rs

//! 模型驱动
//!
//! 持有全部组件并执行主循环。每个进程各自构造一个模型，
//! 所有集合操作按相同顺序调用。
//!
//! # 主循环
//!
//! ```text
//! 载入起始快照 → 边界 → 算子初始化 → 检查行
//! loop {
//!     (预报) 调整步长
//!     算子 → 压力投影 → (保存压力) → (统计/截面)
//!     结束则退出
//!     预报: RK 子步 → 推进时间 → (保存快照与时间记录)
//!     重放: 跳到下一快照 → 载入（全组一致）
//!     边界 → (检查行)
//! }
//! ```

use mf_config::{
    BoundarySection, ConfigSource, CrossSection, FieldsSection, GridSection, InitSection, MpiSection,
    PresSection, RunMode, StatsSection, TimeSection, KNOWN_SECTIONS,
};
use mf_fields::{apply_initial_state, FieldStore, Grid};
use mf_foundation::{MfError, MfResult};
use mf_io::paths::summary_path;
use mf_io::{SummaryLine, SummaryWriter};
use mf_parallel::{Communicator, Topology};
use mf_stats::{Cross, Stats};
use tracing::{debug, info, warn};

use super::timeloop::{TimeLoop, TimeState};
use crate::boundary::Boundary;
use crate::operators::{build_operators, PhysicsOperator, StabilityKind, StepContext};
use crate::pressure::Pressure;

/// 模型
pub struct Model<'c> {
    comm: &'c dyn Communicator,
    simname: String,
    topo: Topology,
    grid: Grid,
    fields: FieldStore,
    init: InitSection,
    boundary: Boundary,
    operators: Vec<Box<dyn PhysicsOperator>>,
    pressure: Pressure,
    timeloop: TimeLoop,
    stats: Option<Stats>,
    cross: Option<Cross>,
    summary: Option<SummaryWriter>,
    last_check: f64,
}

impl<'c> Model<'c> {
    /// 按配置构造全部组件
    pub fn new(comm: &'c dyn Communicator, simname: &str, source: &ConfigSource) -> MfResult<Self> {
        if comm.is_root() {
            for name in source.unknown_sections(KNOWN_SECTIONS) {
                warn!("忽略未知配置节: {}", name);
            }
        }

        let mpi: MpiSection = source.section()?;
        let grid_cfg: GridSection = source.section()?;
        let topo = Topology::new(
            comm.size(),
            comm.rank(),
            mpi.npx,
            mpi.npy,
            grid_cfg.periodic_x,
            grid_cfg.periodic_y,
        )?;
        let grid = Grid::new(&grid_cfg, &topo)?;

        let fields_cfg: FieldsSection = source.section()?;
        let fields = FieldStore::new(&fields_cfg, &grid);

        let boundary_cfg: BoundarySection = source.section()?;
        let boundary = Boundary::new(&boundary_cfg, &topo, &grid);
        let operators = build_operators(source, &grid, &fields)?;

        let pres_cfg: PresSection = source.section()?;
        let mut pressure = Pressure::new(&pres_cfg, &topo, &grid)?;
        pressure.setvalues(&grid)?;

        let time_cfg: TimeSection = source.section()?;
        let timeloop = TimeLoop::new(&time_cfg, fields.datadir())?;

        if comm.is_root() {
            std::fs::create_dir_all(fields.datadir()).map_err(|e| {
                MfError::io_with_source(format!("无法创建目录 {}", fields.datadir().display()), e)
            })?;
        }

        let stats_cfg: StatsSection = source.section()?;
        let stats = if stats_cfg.enabled {
            Some(Stats::create(
                &stats_cfg,
                simname,
                &grid,
                &fields,
                time_cfg.start_iteration,
                comm.is_root(),
            )?)
        } else {
            None
        };

        let cross_cfg: CrossSection = source.section()?;
        let cross = if cross_cfg.is_active() {
            Some(Cross::new(&cross_cfg, &topo, &grid, &fields)?)
        } else {
            None
        };

        let init: InitSection = source.section()?;

        if comm.is_root() {
            info!(
                "模型 {}: {}x{}x{} 网格, {}x{} 进程, {:?} 模式",
                simname,
                grid.extent.itot,
                grid.extent.jtot,
                grid.extent.ktot,
                topo.npx(),
                topo.npy(),
                time_cfg.mode
            );
        }
        debug!("子区域 {:?}", grid.sub);

        Ok(Self {
            comm,
            simname: simname.to_string(),
            topo,
            grid,
            fields,
            init,
            boundary,
            operators,
            pressure,
            timeloop,
            stats,
            cross,
            summary: None,
            last_check: 0.0,
        })
    }

    /// 网格
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 拓扑
    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    /// 场存储
    pub fn fields(&self) -> &FieldStore {
        &self.fields
    }

    /// 时间循环
    pub fn timeloop(&self) -> &TimeLoop {
        &self.timeloop
    }

    /// 统计（未启用时为 `None`）
    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    /// 压力求解器
    pub fn pressure(&self) -> &Pressure {
        &self.pressure
    }

    /// 生成初始场并保存起始快照与时间记录
    pub fn init(&mut self) -> MfResult<()> {
        let rank = self.comm.rank();
        apply_initial_state(&self.init, &self.grid, &mut self.fields, rank);
        self.boundary.apply(self.comm, &self.grid, &mut self.fields)?;

        let iteration = self.timeloop.state().iteration;
        self.fields.save(iteration, rank)?;
        if self.comm.is_root() {
            self.timeloop.save()?;
            info!("初始场已保存: 迭代步 {}", iteration);
        }
        self.comm.barrier()
    }

    /// 执行主循环，返回结束时的时间状态
    pub fn run(&mut self) -> MfResult<TimeState> {
        let start = self.timeloop.state().iteration;
        self.load_agreed(start)?;

        if self.comm.is_root() {
            let path = summary_path(self.fields.datadir(), &self.simname);
            self.summary = Some(SummaryWriter::open(&path)?);
        }

        self.boundary.apply(self.comm, &self.grid, &mut self.fields)?;
        self.timeloop.start();
        self.initialize_operators()?;
        self.last_check = self.comm.wtime();
        self.write_check()?;

        let mode = self.timeloop.mode();
        loop {
            if mode == RunMode::Prognostic {
                let (cfl, dn) = self.stability()?;
                self.timeloop.settimestep(cfl, dn);
            }

            self.exec_operators()?;
            let subdt = self.timeloop.subdt();
            let report = self.pressure.exec(self.comm, &self.grid, &mut self.fields, subdt)?;
            if let Err(e) = report.status() {
                if self.comm.is_root() {
                    warn!("迭代步 {}: {}", self.timeloop.state().iteration, e);
                }
            }

            let iteration = self.timeloop.state().iteration;
            if self.timeloop.dosave() {
                self.fields.save_pressure(iteration, self.comm.rank())?;
            }
            if self.timeloop.dostats() {
                self.exec_stats()?;
            }

            if !self.timeloop.state().running {
                break;
            }

            match mode {
                RunMode::Prognostic => {
                    self.timeloop.exec(&mut self.fields);
                    self.timeloop.timestep();
                    if self.timeloop.dosave() {
                        let iteration = self.timeloop.state().iteration;
                        self.fields.save(iteration, self.comm.rank())?;
                        if self.comm.is_root() {
                            self.timeloop.save()?;
                        }
                    }
                }
                RunMode::Replay => {
                    self.fields.reset_tendencies();
                    self.timeloop.postprocstep();
                    if !self.timeloop.state().running {
                        break;
                    }
                    let next = self.timeloop.state().iteration;
                    self.load_agreed(next)?;
                    if self.timeloop.state().time > self.timeloop.config().endtime {
                        self.timeloop.stop();
                        break;
                    }
                }
            }

            self.boundary.apply(self.comm, &self.grid, &mut self.fields)?;
            if self.timeloop.docheck() {
                self.write_check()?;
            }
        }

        let state = *self.timeloop.state();
        if self.comm.is_root() {
            info!("{} 结束: 迭代步 {}, 时间 {:.6}", self.simname, state.iteration, state.time);
        }
        Ok(state)
    }

    /// 载入快照与时间记录；任一进程失败则全组以 IO 错误终止
    fn load_agreed(&mut self, iteration: u64) -> MfResult<()> {
        let rank = self.comm.rank();
        let result = self
            .fields
            .load(iteration, rank)
            .and_then(|_| self.timeloop.load(iteration));
        if self.comm.all_agree(result.is_ok())? {
            debug!("载入迭代步 {}", iteration);
            return Ok(());
        }
        match result {
            Err(e) => Err(e),
            Ok(()) => Err(MfError::io(format!("其他进程无法载入迭代步 {iteration}"))),
        }
    }

    fn initialize_operators(&mut self) -> MfResult<()> {
        let time = *self.timeloop.state();
        let ctx = StepContext {
            comm: self.comm,
            grid: &self.grid,
            time: &time,
            subdt: self.timeloop.subdt(),
        };
        for op in &mut self.operators {
            op.initialize(&ctx, &self.fields)?;
        }
        Ok(())
    }

    fn exec_operators(&mut self) -> MfResult<()> {
        let time = *self.timeloop.state();
        let ctx = StepContext {
            comm: self.comm,
            grid: &self.grid,
            time: &time,
            subdt: self.timeloop.subdt(),
        };
        for op in &mut self.operators {
            op.exec(&ctx, &mut self.fields)?;
        }
        Ok(())
    }

    /// 全部算子给出的最大 Courant 数与扩散数
    fn stability(&self) -> MfResult<(f64, f64)> {
        let time = *self.timeloop.state();
        let ctx = StepContext {
            comm: self.comm,
            grid: &self.grid,
            time: &time,
            subdt: self.timeloop.subdt(),
        };
        let (mut cfl, mut dn) = (0.0_f64, 0.0_f64);
        for op in &self.operators {
            if let Some(number) = op.stability_number(&ctx, &self.fields)? {
                match number.kind {
                    StabilityKind::Courant => cfl = cfl.max(number.value),
                    StabilityKind::Diffusion => dn = dn.max(number.value),
                }
            }
        }
        Ok((cfl, dn))
    }

    fn exec_stats(&mut self) -> MfResult<()> {
        let state = *self.timeloop.state();
        if let Some(stats) = &mut self.stats {
            stats.exec(self.comm, &self.grid, &self.fields, state.iteration, state.time)?;
        }
        if let Some(cross) = &self.cross {
            cross.exec(self.comm, &self.grid, &self.fields, state.iteration)?;
        }
        Ok(())
    }

    fn write_check(&mut self) -> MfResult<()> {
        let (cfl, dnum) = self.stability()?;
        let div = self.pressure.check(self.comm, &self.grid, &self.fields)?;
        let mom = self.fields.check_momentum(self.comm, &self.grid)?;
        let tke = self.fields.check_tke(self.comm, &self.grid)?;
        let mass = self.fields.check_mass(self.comm, &self.grid)?;

        let now = self.comm.wtime();
        let state = self.timeloop.state();
        let line = SummaryLine {
            iteration: state.iteration,
            time: state.time,
            cpudt: now - self.last_check,
            dt: state.dt,
            cfl,
            dnum,
            div,
            mom,
            tke,
            mass,
        };
        self.last_check = now;

        if let Some(writer) = &mut self.summary {
            writer.write(&line)?;
            info!(
                "迭代 {:>8} 时间 {:.4e} dt {:.4e} cfl {:.4} div {:.3e}",
                line.iteration, line.time, line.dt, line.cfl, line.div
            );
        }
        Ok(())
    }
}
