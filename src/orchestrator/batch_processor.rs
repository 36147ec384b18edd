//! 批量检索处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责整场实验的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：准备实验目录、创建 API 客户端
//! 2. **构建任务**：抽样检索式 × 两种排序
//! 3. **并发控制**：使用 Semaphore 限制同时运行的 worker 数量
//! 4. **按完成顺序收集**：每完成一个单元就写入它的全部结果行并 flush
//! 5. **失败隔离**：单元失败只记录、计数，不影响其他单元
//! 6. **全局统计**：调用次数、耗时、吞吐量、错误总数

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::clients::{EutilsClient, Reply, DEFAULT_DATABASE};
use crate::config::Config;
use crate::models::{CaseResult, SortOrder};
use crate::orchestrator::experiment::{ExperimentRun, EINFO_FILE, RESULTS_FILE};
use crate::services::{ErrorLog, ResponseArchive, ResultsWriter};
use crate::utils::logging;
use crate::workflow::{CaseCtx, CaseFlow};

/// 一个检索单元的最终结果
#[derive(Debug)]
pub struct CaseOutcome {
    pub ctx: CaseCtx,
    /// 失败时为带上下文的错误信息
    pub result: std::result::Result<CaseResult, String>,
}

/// 已创建的检索单元任务
///
/// drop 时取消所有尚未完成的任务，提前返回时不会留下还在调用远程接口的任务
struct CaseTasks {
    handles: Vec<AbortHandle>,
}

impl Drop for CaseTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// 收集阶段的计数
#[derive(Debug, Default)]
struct Tally {
    units_ok: usize,
    units_failed: usize,
    rows: usize,
}

/// 运行报告
#[derive(Debug, Clone)]
pub struct RunReport {
    pub experiment_dir: PathBuf,
    /// 本次实验使用的抽样种子
    pub seed: u64,
    /// 远程调用总次数
    pub calls: u64,
    pub elapsed: Duration,
    /// 错误总数（嵌入错误 + 单元失败）
    pub errors: usize,
    pub units_ok: usize,
    pub units_failed: usize,
    /// results.csv 数据行数
    pub rows: usize,
}

impl RunReport {
    /// 每秒调用次数
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.calls as f64 / secs
        } else {
            0.0
        }
    }
}

/// 应用主结构
pub struct App {
    run: ExperimentRun,
    client: Arc<EutilsClient>,
}

impl App {
    /// 初始化应用（完成实验准备）
    ///
    /// 准备阶段的错误都是致命的，此时还没有发出任何远程调用
    pub async fn initialize(config: Config, experiment: Option<&str>) -> Result<Self> {
        logging::log_startup(&config);

        let client = Arc::new(EutilsClient::new(&config)?);
        let run = ExperimentRun::setup(config, experiment).await?;

        Ok(Self { run, client })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<RunReport> {
        let started = Instant::now();
        let total_units = self.run.queries.len() * SortOrder::ALL.len();
        logging::log_units_planned(
            self.run.queries.len(),
            self.run.hedges.len(),
            total_units,
            self.run.config.max_workers,
            self.run.seed,
        );

        self.fetch_db_info().await;

        let results_path = self.run.result_path.join(RESULTS_FILE);
        let writer = match ResultsWriter::create(&results_path) {
            Ok(writer) => writer,
            Err(e) => {
                close_error_log(&self.run.error_log).await;
                return Err(e)
                    .with_context(|| format!("无法创建结果表: {}", results_path.display()));
            }
        };

        let flow = Arc::new(CaseFlow::new(
            self.client.clone(),
            self.run.hedges.clone(),
            ResponseArchive::new(&self.run.result_path),
            self.run.error_log.clone(),
            self.run.error_count.clone(),
            self.run.config.num_results,
            self.run.config.reuse_strategy,
        ));

        let (tasks, mut pending) = self.spawn_all(flow);

        let collected = self
            .collect(&mut pending, writer, total_units)
            .await
            .with_context(|| format!("无法写入结果表: {}", results_path.display()));

        if collected.is_err() {
            warn!("⚠️ 结果表写入失败，取消剩余 {} 个检索单元", pending.len());
        }
        drop(pending);
        drop(tasks);

        let closed = self.run.error_log.close().await.context("无法关闭错误日志");
        let tally = collected?;
        closed?;

        let report = RunReport {
            experiment_dir: self.run.result_path.clone(),
            seed: self.run.seed,
            calls: self.client.call_count(),
            elapsed: started.elapsed(),
            errors: self.run.error_count(),
            units_ok: tally.units_ok,
            units_failed: tally.units_failed,
            rows: tally.rows,
        };

        logging::print_final_stats(&report);

        Ok(report)
    }

    // ========== 按完成顺序收集 ==========

    /// 每完成一个单元就写入它的全部结果行；失败的单元只记录、计数
    ///
    /// 只有结果表写入失败会提前返回
    async fn collect<F>(
        &self,
        pending: &mut FuturesUnordered<F>,
        mut writer: ResultsWriter,
        total_units: usize,
    ) -> std::result::Result<Tally, csv::Error>
    where
        F: std::future::Future<Output = CaseOutcome>,
    {
        let mut tally = Tally::default();
        let mut completed = 0;

        while let Some(outcome) = pending.next().await {
            let ctx = outcome.ctx;
            match outcome.result {
                Ok(result) => {
                    writer.write_case(ctx.search_index, ctx.sort, &result)?;
                    tally.units_ok += 1;
                }
                Err(message) => {
                    error!("{} ❌ 处理过程中发生错误: {}", ctx, message);
                    self.run.add_error();
                    if let Err(e) = self
                        .run
                        .error_log
                        .write(ctx.search_index, ctx.sort, None, &message)
                        .await
                    {
                        error!("{} 无法写入错误日志: {}", ctx, e);
                    }
                    tally.units_failed += 1;
                }
            }
            completed += 1;
            logging::log_progress(completed, total_units, &ctx);
        }

        tally.rows = writer.finish()?;
        Ok(tally)
    }

    /// 为每个（检索式, 排序）单元创建任务
    ///
    /// 所有任务立即创建，由 Semaphore 控制同时运行的数量
    fn spawn_all(
        &self,
        flow: Arc<CaseFlow>,
    ) -> (
        CaseTasks,
        FuturesUnordered<impl std::future::Future<Output = CaseOutcome>>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.run.config.max_workers));
        let pending = FuturesUnordered::new();
        let mut handles = Vec::with_capacity(self.run.queries.len() * SortOrder::ALL.len());

        for query in &self.run.queries {
            for sort in SortOrder::ALL {
                let ctx = CaseCtx::new(query.search_index, sort);
                let query = query.clone();
                let flow = flow.clone();
                let semaphore = semaphore.clone();

                let handle = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| e.to_string())?;
                    flow.run(&query, &ctx).await.map_err(|e| format!("{:#}", e))
                });
                handles.push(handle.abort_handle());

                pending.push(async move {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(format!("任务执行失败: {}", e)),
                    };
                    CaseOutcome { ctx, result }
                });
            }
        }

        (CaseTasks { handles }, pending)
    }

    /// 获取数据库信息并归档，失败不影响实验
    async fn fetch_db_info(&self) {
        match self.client.info(Some(DEFAULT_DATABASE)).await {
            Ok(reply) => {
                let path = self.run.result_path.join(EINFO_FILE);
                if let Err(e) = tokio::fs::write(&path, reply.raw()).await {
                    warn!("⚠️ 无法保存数据库信息: {}", e);
                }
                if let Reply::Parsed { data, .. } = &reply {
                    info!(
                        "📚 数据库 {}: 记录数 {:?}, 最后更新 {:?}",
                        data.db_name.as_deref().unwrap_or(DEFAULT_DATABASE),
                        data.count,
                        data.last_update
                    );
                }
            }
            Err(e) => warn!("⚠️ 获取数据库信息失败: {}", e),
        }
    }
}

/// 提前退出时也把错误日志落盘
async fn close_error_log(error_log: &ErrorLog) {
    if let Err(e) = error_log.close().await {
        error!("无法关闭错误日志: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        let report = RunReport {
            experiment_dir: PathBuf::from("/tmp/x"),
            seed: 7,
            calls: 30,
            elapsed: Duration::from_secs(10),
            errors: 0,
            units_ok: 2,
            units_failed: 0,
            rows: 4,
        };
        assert!((report.throughput() - 3.0).abs() < 1e-9);

        let instant = RunReport {
            elapsed: Duration::ZERO,
            ..report
        };
        assert_eq!(instant.throughput(), 0.0);
    }

    #[tokio::test]
    async fn test_dropping_case_tasks_aborts_unfinished_units() {
        let running = tokio::spawn(std::future::pending::<()>());
        let (tx, rx) = tokio::sync::oneshot::channel();
        let finished = tokio::spawn(async move {
            let _ = tx.send(());
        });
        rx.await.unwrap();

        let tasks = CaseTasks {
            handles: vec![running.abort_handle(), finished.abort_handle()],
        };
        drop(tasks);

        assert!(running.await.unwrap_err().is_cancelled());
        assert!(finished.await.is_ok());
    }
}
