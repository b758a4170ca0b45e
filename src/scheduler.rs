//! 定时驱动 - 按固定间隔重复执行同步

use crate::config::MirrorConfig;
use crate::core::{find_stale_entries, ActionSink, PassReport, Reconciler};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// 同步调度器
///
/// 每轮同步在阻塞线程池中完整执行，结束后才开始计时等待下一轮，
/// 因此两轮之间不会重叠。等待期间收到 Ctrl-C 会正常退出；正在进行的
/// 同步不会被打断。
pub struct Scheduler<S: ActionSink + Send + 'static> {
    config: MirrorConfig,
    reconciler: Option<Reconciler<S>>,
    passes: u64,
}

impl<S: ActionSink + Send + 'static> Scheduler<S> {
    pub fn new(config: MirrorConfig, reconciler: Reconciler<S>) -> Self {
        Self {
            config,
            reconciler: Some(reconciler),
            passes: 0,
        }
    }

    /// 已完成的同步轮数
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn into_reconciler(self) -> Option<Reconciler<S>> {
        self.reconciler
    }

    /// 循环执行同步，直到出错、收到退出信号，或 `once` 模式下执行完一轮
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "开始镜像: {} -> {}，间隔 {}s",
            self.config.source.display(),
            self.config.replica.display(),
            self.config.interval.as_secs()
        );

        loop {
            let report = self.run_pass().await?;
            if report.prune_skipped > 0 {
                self.report_divergence(report.prune_skipped).await;
            }
            debug!(
                "同步报告: {}",
                serde_json::to_string(&report).unwrap_or_default()
            );

            if self.config.once {
                return Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("收到退出信号，停止同步（已完成 {} 轮）", self.passes);
                    return Ok(());
                }
            }
        }
    }

    /// 执行一轮同步
    pub async fn run_pass(&mut self) -> Result<PassReport> {
        let mut reconciler = self
            .reconciler
            .take()
            .context("reconciler lost after a failed pass")?;
        let source = self.config.source.clone();
        let replica = self.config.replica.clone();

        // 同步是阻塞 IO，放到 blocking 线程池
        let (reconciler, result) = tokio::task::spawn_blocking(move || {
            let result = reconciler.reconcile(&source, &replica);
            (reconciler, result)
        })
        .await
        .context("sync pass panicked")?;

        self.reconciler = Some(reconciler);
        let report = result.context("sync pass aborted")?;
        self.passes += 1;
        Ok(report)
    }

    /// 删除阶段按条目数判断，可能留下多余条目；这里只报告，不处理
    async fn report_divergence(&self, skipped: u32) {
        warn!("本轮有 {} 个多余条目未删除，将在之后的轮次处理", skipped);
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }

        let source = self.config.source.clone();
        let replica = self.config.replica.clone();

        let stale = tokio::task::spawn_blocking(move || find_stale_entries(&source, &replica)).await;

        match stale {
            Ok(Ok(stale)) => {
                for path in &stale {
                    debug!("多余条目: {}", path.display());
                }
            }
            Ok(Err(e)) => warn!("分歧扫描失败: {}", e),
            Err(e) => warn!("分歧扫描任务异常: {}", e),
        }
    }
}
