//! 原始响应归档服务
//!
//! `<实验目录>/<search_index>/<sort>.xml`，内容与远程返回的字节完全一致

use std::io;
use std::path::PathBuf;
use tokio::fs;

use crate::models::SortOrder;

/// 原始响应归档
#[derive(Debug, Clone)]
pub struct ResponseArchive {
    root: PathBuf,
}

impl ResponseArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 归档文件路径
    pub fn path_for(&self, search_index: usize, sort: SortOrder) -> PathBuf {
        self.root
            .join(search_index.to_string())
            .join(format!("{}.xml", sort.as_param()))
    }

    /// 写入一次检索的原始响应
    pub async fn store(
        &self,
        search_index: usize,
        sort: SortOrder,
        body: &[u8],
    ) -> io::Result<PathBuf> {
        let path = self.path_for(search_index, sort);
        if let Some(dir) = path.parent() {
            // 两种排序共用一个目录，可能已被另一个 worker 创建
            fs::create_dir_all(dir).await?;
        }
        fs::write(&path, body).await?;
        Ok(path)
    }
}
