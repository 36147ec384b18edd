//! # Best Match Bias
//!
//! 针对 PubMed 检索排序的偏倚检测实验：抽样一批检索式，分别按相关度和日期倒序检索，
//! 再用一组 hedge 检索片段过滤每次的结果集，统计各偏倚维度的命中数变化。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有所有 worker 共享的稀缺资源
//! - `RateLimiter` - 令牌桶，所有远程调用都要先拿令牌
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 远程接口能力，只负责"发请求 + 解析响应"
//! - `EutilsClient` - esearch / epost / einfo
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `ErrorLog` - 写 error_log.txt 能力（可并发）
//! - `ResultsWriter` - 写 results.csv 能力（单写者）
//! - `ResponseArchive` - 归档原始响应
//! - `sample_queries` - 按种子抽样
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个检索单元"的完整处理流程
//! - `CaseCtx` - 上下文封装（search_index + sort）
//! - `CaseFlow` - 流程编排（search → 归档 → hedge 子检索）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/experiment` - 实验准备
//! - `orchestrator/batch_processor` - 并发调度、结果收集、统计
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::EutilsClient;
pub use config::{Config, ReuseStrategy};
pub use error::{AppError, AppResult};
pub use infrastructure::RateLimiter;
pub use models::{CaseResult, HedgeDefinition, Query, SortOrder};
pub use orchestrator::{App, RunReport};
pub use workflow::{CaseCtx, CaseFlow};
