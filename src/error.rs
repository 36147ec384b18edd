use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 实验准备阶段错误
    #[error("准备错误: {0}")]
    Setup(#[from] SetupError),
}

/// API 调用错误
///
/// 这类错误只会让当前检索单元失败，不影响其他单元
#[derive(Debug, Error)]
pub enum ApiError {
    /// 远程接口返回非成功状态码
    #[error("远程调用失败 (状态码: {status}, URL: {url})")]
    RemoteCallFailed { status: u16, url: String },
    /// 网络请求失败（已用尽连接重试次数）
    #[error("API请求失败 ({url}): {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP 客户端初始化失败
    #[error("HTTP 客户端初始化失败: {0}")]
    ClientInit(#[source] reqwest::Error),
    /// 注册 ID 列表后没有拿到 WebEnv / QueryKey
    #[error("未返回历史句柄 ({url}): {}", errors.join("; "))]
    MissingHistoryHandle { url: String, errors: Vec<String> },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败（包括未知配置项）
    #[error("配置文件解析失败 {path}: {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置值不合法
    #[error("配置项 {key} 不合法: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// 实验准备阶段错误，出现即终止运行
#[derive(Debug, Error)]
pub enum SetupError {
    /// 实验目录已存在
    #[error("实验目录已存在: {path}")]
    ExperimentExists { path: String },
    /// 输入文件不存在
    #[error("输入文件不存在: {path}")]
    InputNotFound { path: String },
    /// 输入文件缺少必需列
    #[error("文件 {path} 缺少列: {column}")]
    MissingColumn { path: String, column: String },
    /// 候选检索式不足以抽样
    #[error("无法从 {available} 条检索式中抽取 {requested} 条")]
    NotEnoughQueries { requested: usize, available: usize },
    /// 读取表格失败
    #[error("读取表格失败 ({path}): {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    /// 文件操作失败
    #[error("文件操作失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ========== 便捷构造函数 ==========

impl SetupError {
    /// 创建文件操作错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        SetupError::Io {
            path: path.into(),
            source,
        }
    }

    /// 创建表格读取错误
    pub fn csv(path: impl Into<String>, source: csv::Error) -> Self {
        SetupError::Csv {
            path: path.into(),
            source,
        }
    }
}

impl ConfigError {
    /// 创建配置值不合法错误
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_call_failed_mentions_status_and_url() {
        let err = AppError::from(ApiError::RemoteCallFailed {
            status: 502,
            url: "https://example.org/esearch.fcgi".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("esearch.fcgi"));
    }

    #[test]
    fn test_missing_history_handle_joins_errors() {
        let err = ApiError::MissingHistoryHandle {
            url: "u".to_string(),
            errors: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().ends_with("a; b"));
    }
}
