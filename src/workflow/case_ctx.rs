//! 检索单元上下文
//!
//! 封装"我正在处理哪条检索式的哪种排序"这一信息

use std::fmt::Display;

use crate::models::SortOrder;

/// 检索单元上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseCtx {
    /// 检索式编号
    pub search_index: usize,

    /// 排序方式
    pub sort: SortOrder,
}

impl CaseCtx {
    /// 创建新的检索单元上下文
    pub fn new(search_index: usize, sort: SortOrder) -> Self {
        Self { search_index, sort }
    }
}

impl Display for CaseCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[检索 #{} {}]", self.search_index, self.sort)
    }
}
