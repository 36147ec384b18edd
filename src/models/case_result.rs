/// 单个 hedge 的命中数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiasCount {
    pub hedge_name: String,
    pub matched_count: usize,
}

/// 一个检索单元（检索式 × 排序方式）的结果
///
/// 由 `CaseFlow` 创建，编排层写入结果表后即丢弃
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseResult {
    /// 索引报告的总命中数
    pub result_count: u64,
    /// 实际返回的 ID 数量（不超过 num_results）
    pub return_count: usize,
    /// 本单元内出现的错误数
    pub error_count: usize,
    /// 按 hedge 列表顺序排列
    pub bias_counts: Vec<BiasCount>,
}
