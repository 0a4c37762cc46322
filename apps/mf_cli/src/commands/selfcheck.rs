// apps/mf_cli/src/commands/selfcheck.rs

//! 分解布局自检
//!
//! 检查分区、晕区交换（含周期回绕）与铅笔转置往返，不读写任何快照。

use anyhow::{bail, Context, Result};
use mf_config::ConfigSource;
use mf_parallel::{partition_all, LayoutCheck, Transposer};
use tracing::info;

use super::{launch, layout};

/// 执行自检命令
pub fn execute(source: &ConfigSource) -> Result<()> {
    let report = launch(source, |comm| {
        let (topo, sub, extent, halo) = layout(source, comm.size(), comm.rank())?;
        let transposer = Transposer::new(&topo, extent, &partition_all(&topo, extent, halo)?)?;
        LayoutCheck::new(&topo, &sub, extent).run(comm, &transposer)
    })
    .context("布局自检中止")?;

    // 报告已在全组归约，根进程代表全组
    let Some(report) = report else {
        return Ok(());
    };
    if !report.is_ok() {
        bail!("布局自检失败: {:?}", report);
    }
    info!("布局自检通过: 检查 {} 个晕区网格", report.halo_checked);
    Ok(())
}
