// crates/mf_physics/src/engine/timeloop.rs

//! 时间循环状态机
//!
//! 两种运行模式共用同一套节奏判断：
//!
//! - 预报：自适应步长，低存储 Runge-Kutta 子步推进
//! - 重放：按 `postproc_stride` 跳到下一个快照迭代步，从磁盘载入状态
//!
//! `dosave`/`dostats`/`docheck` 只依赖迭代步与配置间隔，子步中一律为假。

use std::path::PathBuf;

use mf_config::{RunMode, TimeSection};
use mf_fields::FieldStore;
use mf_foundation::MfResult;
use mf_io::TimeRecord;
use tracing::debug;

use super::integrator::LowStorageRk;

/// 结束时间的相对容差
const END_TOLERANCE: f64 = 1e-12;

/// 时间状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeState {
    /// 迭代步
    pub iteration: u64,
    /// 模拟时间
    pub time: f64,
    /// 当前时间步长
    pub dt: f64,
    /// 当前子步
    pub substep: usize,
    /// 是否继续运行
    pub running: bool,
}

impl TimeState {
    /// 主步开始处的状态
    pub fn new(iteration: u64, time: f64, dt: f64) -> Self {
        Self {
            iteration,
            time,
            dt,
            substep: 0,
            running: true,
        }
    }
}

/// 循环阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// 尚未进入主循环
    Initializing,
    /// 主步，本步输出检查行
    Checking,
    /// 主步
    MainStep,
    /// Runge-Kutta 中间子步
    Substep,
    /// 已结束
    Terminated,
}

/// 时间循环
#[derive(Debug, Clone)]
pub struct TimeLoop {
    cfg: TimeSection,
    datadir: PathBuf,
    rk: LowStorageRk,
    state: TimeState,
    started: bool,
}

impl TimeLoop {
    /// 由时间配置创建，从 `start_iteration`、时间零点开始
    pub fn new(cfg: &TimeSection, datadir: impl Into<PathBuf>) -> MfResult<Self> {
        Ok(Self {
            cfg: cfg.clone(),
            datadir: datadir.into(),
            rk: LowStorageRk::new(cfg.rkorder)?,
            state: TimeState::new(cfg.start_iteration, 0.0, cfg.dt),
            started: false,
        })
    }

    /// 当前状态
    pub fn state(&self) -> &TimeState {
        &self.state
    }

    /// 运行模式
    pub fn mode(&self) -> RunMode {
        self.cfg.mode
    }

    /// 配置
    pub fn config(&self) -> &TimeSection {
        &self.cfg
    }

    /// 进入主循环
    pub fn start(&mut self) {
        self.started = true;
        self.update_running();
    }

    /// 当前阶段
    pub fn phase(&self) -> LoopPhase {
        if !self.started {
            LoopPhase::Initializing
        } else if !self.state.running {
            LoopPhase::Terminated
        } else if self.insubstep() {
            LoopPhase::Substep
        } else if self.docheck() {
            LoopPhase::Checking
        } else {
            LoopPhase::MainStep
        }
    }

    /// 是否处于中间子步
    pub fn insubstep(&self) -> bool {
        self.state.substep > 0
    }

    /// 当前子步长
    pub fn subdt(&self) -> f64 {
        self.rk.weight(self.state.substep) * self.state.dt
    }

    /// 按稳定性数调整步长；子步中或固定步长时不变
    pub fn settimestep(&mut self, cfl: f64, dn: f64) {
        if self.insubstep() || !self.cfg.adaptive {
            return;
        }
        let dt = self.state.dt;
        let mut next = self.cfg.dtmax;
        if cfl > 0.0 {
            next = next.min(dt * self.cfg.cflmax / cfl);
        }
        if dn > 0.0 {
            next = next.min(dt * self.cfg.dnmax / dn);
        }
        let remaining = self.cfg.endtime - self.state.time;
        if remaining > 0.0 {
            next = next.min(remaining);
        }
        debug!("时间步长 {:.6e} -> {:.6e} (cfl={:.4}, dn={:.4})", dt, next, cfl, dn);
        self.state.dt = next;
    }

    /// 执行一个 Runge-Kutta 子步
    pub fn exec(&mut self, fields: &mut FieldStore) {
        self.rk.stage(self.state.substep, self.state.dt, fields);
        self.state.substep = (self.state.substep + 1) % self.rk.stages();
    }

    /// 完成全部子步后推进时间与迭代步
    pub fn timestep(&mut self) {
        if self.insubstep() {
            return;
        }
        self.state.time += self.state.dt;
        self.state.iteration += 1;
        self.update_running();
    }

    /// 重放模式下跳到下一个快照迭代步
    pub fn postprocstep(&mut self) {
        self.state.iteration += self.cfg.postproc_stride;
        if self.state.iteration > self.cfg.end_iteration {
            self.state.running = false;
        }
    }

    fn update_running(&mut self) {
        let tolerance = END_TOLERANCE * self.cfg.endtime.abs().max(1.0);
        let mut running = match self.cfg.mode {
            RunMode::Prognostic => self.cfg.endtime - self.state.time > tolerance,
            RunMode::Replay => self.state.iteration <= self.cfg.end_iteration,
        };
        if let Some(max) = self.cfg.max_iterations {
            running &= self.state.iteration - self.cfg.start_iteration.min(self.state.iteration) < max;
        }
        self.state.running = running;
    }

    /// 停止循环
    pub fn stop(&mut self) {
        self.state.running = false;
    }

    fn on_cadence(&self, interval: u64) -> bool {
        !self.insubstep() && interval > 0 && self.state.iteration % interval == 0
    }

    /// 本步是否保存快照
    pub fn dosave(&self) -> bool {
        self.on_cadence(self.cfg.save_interval)
    }

    /// 本步是否计算统计
    pub fn dostats(&self) -> bool {
        self.on_cadence(self.cfg.stats_interval)
    }

    /// 本步是否输出检查行
    pub fn docheck(&self) -> bool {
        self.on_cadence(self.cfg.check_interval)
    }

    /// 当前时间记录
    pub fn record(&self) -> TimeRecord {
        TimeRecord {
            iteration: self.state.iteration,
            time: self.state.time,
            dt: self.state.dt,
        }
    }

    /// 保存当前迭代步的时间记录
    pub fn save(&self) -> MfResult<()> {
        self.record().save(&self.datadir)
    }

    /// 载入指定迭代步的时间记录
    pub fn load(&mut self, iteration: u64) -> MfResult<()> {
        let record = TimeRecord::load(&self.datadir, iteration)?;
        self.state.iteration = record.iteration;
        self.state.time = record.time;
        self.state.dt = record.dt;
        self.state.substep = 0;
        Ok(())
    }
}
