use serde::{Deserialize, Serialize};

/// hedge 定义：代表一个偏倚维度的布尔检索片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeDefinition {
    /// 简码，唯一
    pub name: String,
    /// 追加在基础检索式后面的检索片段
    pub query_fragment: String,
}

impl HedgeDefinition {
    pub fn new(name: impl Into<String>, query_fragment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query_fragment: query_fragment.into(),
        }
    }
}
