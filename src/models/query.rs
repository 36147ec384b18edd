use serde::{Deserialize, Serialize};
use std::fmt;

/// 排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// 按相关度（Best Match）
    #[serde(rename = "relevance")]
    Relevance,
    /// 按日期倒序
    #[serde(rename = "date_desc")]
    DateDescending,
}

impl SortOrder {
    /// 每个检索式都要跑的两种排序
    pub const ALL: [SortOrder; 2] = [SortOrder::Relevance, SortOrder::DateDescending];

    /// 远程接口使用的参数值，同时用作结果表里的 sort 列和归档文件名
    pub fn as_param(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::DateDescending => "date_desc",
        }
    }

    /// 从参数值解析排序方式
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "relevance" => Some(SortOrder::Relevance),
            "date_desc" => Some(SortOrder::DateDescending),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// 抽样得到的检索式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// 输入文件中的行号（从 0 开始），整个实验内稳定
    pub search_index: usize,
    pub query_term: String,
}

impl Query {
    pub fn new(search_index: usize, query_term: impl Into<String>) -> Self {
        Self {
            search_index,
            query_term: query_term.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_params() {
        for sort in SortOrder::ALL {
            assert_eq!(SortOrder::from_param(sort.as_param()), Some(sort));
        }
        assert_eq!(SortOrder::DateDescending.to_string(), "date_desc");
        assert_eq!(SortOrder::from_param("pub_date"), None);
    }
}
