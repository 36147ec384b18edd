/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::RunReport;
use crate::workflow::CaseCtx;

/// 初始化日志
///
/// 日志级别读取 `RUST_LOG`，默认 `info`；重复调用无副作用
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - Best Match 偏倚检测实验");
    info!(
        "📊 并发 worker: {} | 限流: {} 次/秒 | 抽样: {} 条 | 每次返回: {} 条",
        config.max_workers, config.rate_limit, config.num_queries, config.num_results
    );
    info!("🔗 API 前缀: {}", config.api_prefix);
    info!("{}", "=".repeat(60));
}

/// 记录任务规划信息
///
/// # 参数
/// - `queries`: 检索式数量
/// - `hedges`: hedge 数量
/// - `units`: 检索单元总数
/// - `max_workers`: 并发 worker 数量
/// - `seed`: 抽样种子
pub fn log_units_planned(
    queries: usize,
    hedges: usize,
    units: usize,
    max_workers: usize,
    seed: u64,
) {
    info!("✓ {} 条检索式 × 2 种排序 = {} 个检索单元", queries, units);
    info!("🎲 抽样种子: {}", seed);
    info!("📋 每个单元 {} 个 hedge 子检索", hedges);
    info!("💡 最多同时运行 {} 个单元\n", max_workers);
}

/// 记录单元完成进度（无论成功失败都推进一次）
pub fn log_progress(completed: usize, total: usize, ctx: &CaseCtx) {
    info!("⏳ 进度 {}/{} {} 已完成", completed, total, ctx);
}

/// 打印最终统计信息
pub fn print_final_stats(report: &RunReport) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "📡 {} 次 API 调用, 用时 {:.2} 秒 (每秒 {:.1} 次)",
        report.calls,
        report.elapsed.as_secs_f64(),
        report.throughput()
    );
    info!(
        "✅ 成功单元: {}/{}",
        report.units_ok,
        report.units_ok + report.units_failed
    );
    info!("❌ 错误总数: {}", report.errors);
    info!("📝 结果行数: {}", report.rows);
    info!("🎲 抽样种子: {}", report.seed);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", report.experiment_dir.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
