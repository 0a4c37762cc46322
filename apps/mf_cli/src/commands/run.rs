// apps/mf_cli/src/commands/run.rs

//! 运行模拟（预报或重放）

use std::time::Instant;

use anyhow::{Context, Result};
use mf_config::ConfigSource;
use mf_physics::Model;
use tracing::info;

use super::{group_size, launch};

/// 执行运行命令
pub fn execute(simname: &str, source: &ConfigSource) -> Result<()> {
    let size = group_size(source)?;
    info!("=== MicroFlow {} 启动: {} 个进程 ===", simname, size);
    let start = Instant::now();

    let state = launch(source, |comm| {
        let mut model = Model::new(comm, simname, source)?;
        model.run()
    })
    .with_context(|| format!("模拟 {simname} 失败"))?;

    if let Some(state) = state {
        info!(
            "=== 完成: 迭代步 {}, 时间 {:.6}, 用时 {:.2?} ===",
            state.iteration,
            state.time,
            start.elapsed()
        );
    }
    Ok(())
}
