//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责整场实验的准备和调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `experiment` - 实验准备
//! - 加载 hedge 定义和候选检索式
//! - 按种子抽样
//! - 创建实验目录，写出 queries.csv / seed.txt
//! - 持有全局错误计数和错误日志
//!
//! ### `batch_processor` - 批量检索处理器
//! - 构建（检索式 × 排序）单元
//! - 控制并发数量（Semaphore）
//! - 按完成顺序写入 results.csv
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<(Query, SortOrder)>)
//!     ↓
//! workflow::CaseFlow (处理单个检索单元)
//!     ↓
//! clients::EutilsClient (esearch / epost / einfo)
//!     ↓
//! infrastructure::RateLimiter
//! ```
//!
//! ## 状态流转
//!
//! `App::initialize`（Created → SetUp）→ `App::run`（Running → Completed）

pub mod batch_processor;
pub mod experiment;

// 重新导出主要类型
pub use batch_processor::{App, CaseOutcome, RunReport};
pub use experiment::ExperimentRun;
