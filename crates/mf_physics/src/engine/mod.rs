// crates/mf_physics/src/engine/mod.rs

//! 时间推进引擎
//!
//! - [`timeloop`]: 时间循环状态机（预报与重放两种模式）
//! - [`integrator`]: 低存储 Runge-Kutta
//! - [`model`]: 模型驱动与主循环

pub mod integrator;
pub mod model;
pub mod timeloop;

pub use integrator::LowStorageRk;
pub use model::Model;
pub use timeloop::{LoopPhase, TimeLoop, TimeState};
