use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// 默认的 E-utilities 前缀（预览环境，Best Match 排序在此可用）
pub const PREVIEW_PREFIX: &str = "https://eutilspreview.ncbi.nlm.nih.gov/entrez";

/// 命中结果复用方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReuseStrategy {
    /// 把返回的 ID 拼成一个过滤条件直接写进检索式
    UidFilter,
    /// 先 epost 注册 ID 列表，再通过 WebEnv / query_key 引用
    History,
}

impl FromStr for ReuseStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uid_filter" => Ok(ReuseStrategy::UidFilter),
            "history" => Ok(ReuseStrategy::History),
            other => Err(format!("未知的复用方式: {}", other)),
        }
    }
}

/// 程序配置
///
/// 加载顺序：默认值 → TOML 配置文件 → 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// NCBI API key
    pub api_key: Option<String>,
    /// 联系邮箱
    pub email: Option<String>,
    /// 每秒请求数上限
    pub rate_limit: u32,
    /// 抽样的检索式数量
    pub num_queries: usize,
    /// 每次检索返回的结果上限
    pub num_results: usize,
    /// 检索式数据文件
    pub data_path: String,
    /// 检索式数据文件的分隔符
    pub data_sep: String,
    /// 实验结果根目录
    pub result_path: String,
    /// hedge 定义文件
    pub hedge_path: String,
    /// 抽样种子，小于等于 0 表示随机
    pub seed: i64,
    /// 并发 worker 数量
    pub max_workers: usize,
    /// E-utilities 前缀
    pub api_prefix: String,
    /// hedge 子检索如何复用主检索的结果
    pub reuse_strategy: ReuseStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            email: None,
            rate_limit: 3,
            num_queries: 1000,
            num_results: 200,
            data_path: "/data/pubmed-data.tsv".to_string(),
            data_sep: "\t".to_string(),
            result_path: "/data/results".to_string(),
            hedge_path: "/data/hedges.csv".to_string(),
            seed: -1,
            max_workers: 1,
            api_prefix: PREVIEW_PREFIX.to_string(),
            reuse_strategy: ReuseStrategy::UidFilter,
        }
    }
}

impl Config {
    /// 加载配置
    ///
    /// # 参数
    /// - `path`: TOML 配置文件（可选），出现未知配置项时报错
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，未出现的配置项取默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("EUTILS_API_KEY") {
            self.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("EUTILS_EMAIL") {
            self.email = Some(v);
        }
        if let Some(v) = env_parse("RATE_LIMIT", "u32")? {
            self.rate_limit = v;
        }
        if let Some(v) = env_parse("NUM_QUERIES", "usize")? {
            self.num_queries = v;
        }
        if let Some(v) = env_parse("NUM_RESULTS", "usize")? {
            self.num_results = v;
        }
        if let Some(v) = env_parse("MAX_WORKERS", "usize")? {
            self.max_workers = v;
        }
        if let Some(v) = env_parse("SEED", "i64")? {
            self.seed = v;
        }
        if let Some(v) = env_parse("REUSE_STRATEGY", "uid_filter | history")? {
            self.reuse_strategy = v;
        }
        if let Ok(v) = std::env::var("RESULT_PATH") {
            self.result_path = v;
        }
        Ok(())
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit == 0 {
            return Err(ConfigError::invalid("rate_limit", "必须大于 0"));
        }
        if self.num_queries == 0 {
            return Err(ConfigError::invalid("num_queries", "必须大于 0"));
        }
        if self.num_results == 0 {
            return Err(ConfigError::invalid("num_results", "必须大于 0"));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::invalid("max_workers", "至少为 1"));
        }
        if self.data_sep.len() != 1 || !self.data_sep.is_ascii() {
            return Err(ConfigError::invalid("data_sep", "必须是单个 ASCII 字符"));
        }
        Ok(())
    }

    /// 抽样种子，`seed <= 0` 时返回 None
    pub fn sampling_seed(&self) -> Option<u64> {
        (self.seed > 0).then_some(self.seed as u64)
    }

    /// 数据文件分隔符（validate 之后保证是单字节）
    pub fn delimiter(&self) -> u8 {
        self.data_sep.as_bytes().first().copied().unwrap_or(b'\t')
    }
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
