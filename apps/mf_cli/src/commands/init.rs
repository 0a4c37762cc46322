// apps/mf_cli/src/commands/init.rs

//! 生成初始场

use anyhow::{Context, Result};
use mf_config::ConfigSource;
use mf_physics::Model;
use tracing::info;

use super::launch;

/// 执行初始化命令
pub fn execute(simname: &str, source: &ConfigSource) -> Result<()> {
    let root = launch(source, |comm| {
        let mut model = Model::new(comm, simname, source)?;
        model.init()
    })
    .with_context(|| format!("{simname} 初始化失败"))?;
    if root.is_some() {
        info!("{} 初始场已生成", simname);
    }
    Ok(())
}
