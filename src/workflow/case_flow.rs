//! 检索单元处理流程 - 流程层
//!
//! 核心职责：定义"一条检索式 × 一种排序"的完整处理流程
//!
//! 流程顺序：
//! 1. 拼接语料过滤条件 → esearch → 归档原始响应
//! 2. 记录嵌入错误，提取总命中数与返回的 ID
//! 3. 按 hedge 列表顺序逐个子检索，统计命中数
//!
//! 嵌入错误只计数、写日志；传输错误直接返回，由编排层记为单元失败

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{
    EutilsClient, Reply, SearchHandle, SearchRequest, SearchResult, DEFAULT_DATABASE,
};
use crate::config::ReuseStrategy;
use crate::models::{BiasCount, CaseResult, HedgeDefinition, Query};
use crate::services::{ErrorLog, ResponseArchive};
use crate::utils::logging::truncate_text;
use crate::workflow::case_ctx::CaseCtx;

/// 语料过滤条件，所有主检索都限定在 MEDLINE 内
pub const CORPUS_FILTER: &str = "medline[Filter]";

/// hedge 子检索的返回上限
pub const HEDGE_MAX_RESULTS: usize = 200;

/// 子检索的范围
enum Scope<'a> {
    /// 内联的 UID 过滤条件
    UidFilter(String),
    /// 历史服务器上的结果集
    History(&'a SearchHandle),
}

/// 检索单元处理流程
///
/// - 不持有任何输出表，只通过 ErrorLog 追加错误
/// - 多个 worker 共享同一个实例
pub struct CaseFlow {
    client: Arc<EutilsClient>,
    hedges: Arc<[HedgeDefinition]>,
    archive: ResponseArchive,
    error_log: Arc<ErrorLog>,
    error_counter: Arc<AtomicUsize>,
    num_results: usize,
    reuse_strategy: ReuseStrategy,
}

impl CaseFlow {
    /// 创建新的检索单元处理流程
    pub fn new(
        client: Arc<EutilsClient>,
        hedges: Arc<[HedgeDefinition]>,
        archive: ResponseArchive,
        error_log: Arc<ErrorLog>,
        error_counter: Arc<AtomicUsize>,
        num_results: usize,
        reuse_strategy: ReuseStrategy,
    ) -> Self {
        Self {
            client,
            hedges,
            archive,
            error_log,
            error_counter,
            num_results,
            reuse_strategy,
        }
    }

    pub async fn run(&self, query: &Query, ctx: &CaseCtx) -> Result<CaseResult> {
        info!("{} 检索式: {}", ctx, truncate_text(&query.query_term, 80));
        let term = restrict_to_corpus(&query.query_term);

        // ========== 1. 主检索 ==========
        let reply = self
            .client
            .search(&SearchRequest::new(&term, ctx.sort, self.num_results))
            .await?;

        self.archive
            .store(ctx.search_index, ctx.sort, reply.raw())
            .await
            .with_context(|| format!("{} 无法归档原始响应", ctx))?;

        let mut error_count = 0;

        let search = match reply {
            Reply::Parsed { data, .. } => data,
            Reply::Unparsed { content_type, .. } => {
                let msg = format!("无法解析的响应类型: {}", content_type);
                self.record_error(ctx, None, &msg).await;
                error_count += 1;
                SearchResult::default()
            }
        };

        for msg in &search.errors {
            self.record_error(ctx, None, msg).await;
            error_count += 1;
        }

        let result_count = search.matched_count;
        let return_count = search.identifiers.len();
        info!("{} 总命中 {}, 返回 {}", ctx, result_count, return_count);

        // ========== 2. hedge 子检索 ==========
        let bias_counts = if search.identifiers.is_empty() {
            // 没有可过滤的 ID，不发子检索
            self.hedges
                .iter()
                .map(|hedge| BiasCount {
                    hedge_name: hedge.name.clone(),
                    matched_count: 0,
                })
                .collect()
        } else {
            match self.reuse_strategy {
                ReuseStrategy::UidFilter => {
                    let scope = Scope::UidFilter(uid_filter(&search.identifiers));
                    self.count_hedges(ctx, &scope, &mut error_count).await?
                }
                ReuseStrategy::History => {
                    let handle = self
                        .client
                        .register(DEFAULT_DATABASE, &search.identifiers)
                        .await?;
                    self.count_hedges(ctx, &Scope::History(&handle), &mut error_count)
                        .await?
                }
            }
        };

        Ok(CaseResult {
            result_count,
            return_count,
            error_count,
            bias_counts,
        })
    }

    /// 按 hedge 列表顺序逐个子检索
    async fn count_hedges(
        &self,
        ctx: &CaseCtx,
        scope: &Scope<'_>,
        error_count: &mut usize,
    ) -> Result<Vec<BiasCount>> {
        let mut counts = Vec::with_capacity(self.hedges.len());

        for hedge in self.hedges.iter() {
            let (term, reuse) = match scope {
                Scope::UidFilter(filter) => (hedge_term(filter, &hedge.query_fragment), None),
                Scope::History(handle) => (format!("({})", hedge.query_fragment), Some(*handle)),
            };

            let mut request = SearchRequest::new(&term, ctx.sort, HEDGE_MAX_RESULTS);
            if let Some(handle) = reuse {
                request = request.with_reuse(handle);
            }

            let matched_count = match self.client.search(&request).await? {
                Reply::Parsed { data, .. } => {
                    for msg in &data.errors {
                        self.record_error(ctx, Some(&hedge.name), msg).await;
                        *error_count += 1;
                    }
                    data.identifiers.len()
                }
                Reply::Unparsed { content_type, .. } => {
                    let msg = format!("无法解析的响应类型: {}", content_type);
                    self.record_error(ctx, Some(&hedge.name), &msg).await;
                    *error_count += 1;
                    0
                }
            };

            counts.push(BiasCount {
                hedge_name: hedge.name.clone(),
                matched_count,
            });
        }

        Ok(counts)
    }

    /// 记录一条嵌入错误：全局计数 + 错误日志
    async fn record_error(&self, ctx: &CaseCtx, hedge_name: Option<&str>, msg: &str) {
        self.error_counter.fetch_add(1, Ordering::Relaxed);
        match hedge_name {
            Some(hedge) => warn!("{} hedge {} 返回错误: {}", ctx, hedge, msg),
            None => warn!("{} 检索返回错误: {}", ctx, msg),
        }
        if let Err(e) = self
            .error_log
            .write(ctx.search_index, ctx.sort, hedge_name, msg)
            .await
        {
            error!("{} 无法写入错误日志: {}", ctx, e);
        }
    }
}

/// 把检索式限定在语料范围内
pub fn restrict_to_corpus(query_term: &str) -> String {
    format!("({}) AND {}", query_term, CORPUS_FILTER)
}

/// 把返回的 ID 拼成一个过滤条件
pub fn uid_filter(identifiers: &[String]) -> String {
    format!("({})", identifiers.join(" OR "))
}

/// UID 过滤条件与 hedge 片段取交集
pub fn hedge_term(filter: &str, fragment: &str) -> String {
    format!("{} AND ({})", filter, fragment)
}
