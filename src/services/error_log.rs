//! 错误日志服务 - 业务能力层
//!
//! 只负责"写 error_log.txt"能力，可被多个 worker 同时调用

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::SortOrder;

/// 错误日志
///
/// 每个错误一行：`{search_index}, {sort_order}[, {hedge_name}]: {message}`
pub struct ErrorLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ErrorLog {
    /// 创建（或清空）错误日志文件
    pub async fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条错误，写完立即 flush
    pub async fn write(
        &self,
        search_index: usize,
        sort: SortOrder,
        hedge_name: Option<&str>,
        message: &str,
    ) -> io::Result<()> {
        let line = format_line(search_index, sort, hedge_name, message);
        debug!("写入错误日志: {}", line.trim_end());

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// 关闭前把数据落盘
    pub async fn close(&self) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_all().await
    }
}

/// 生成一行错误日志，消息中的换行替换为空格
pub fn format_line(
    search_index: usize,
    sort: SortOrder,
    hedge_name: Option<&str>,
    message: &str,
) -> String {
    let message = message.replace(['\r', '\n'], " ");
    match hedge_name {
        Some(hedge) => format!("{}, {}, {}: {}\n", search_index, sort, hedge, message),
        None => format!("{}, {}: {}\n", search_index, sort, message),
    }
}
