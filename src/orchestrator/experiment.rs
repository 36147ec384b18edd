//! 实验准备 - 编排层
//!
//! ## 职责
//!
//! 在发出任何远程调用之前完成所有准备工作，任何一步失败都直接终止：
//!
//! 1. **加载输入**：hedge 定义、候选检索式（去空、去重）
//! 2. **抽样**：按种子抽取 `num_queries` 条检索式
//! 3. **建目录**：实验目录必须是新的
//! 4. **落盘**：`queries.csv`、`seed.txt`，并创建 `error_log.txt`

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::config::Config;
use crate::error::{AppResult, SetupError};
use crate::models::{load_hedges, load_queries, HedgeDefinition, Query};
use crate::services::{sample_queries, ErrorLog};

pub const QUERIES_FILE: &str = "queries.csv";
pub const SEED_FILE: &str = "seed.txt";
pub const ERROR_LOG_FILE: &str = "error_log.txt";
pub const RESULTS_FILE: &str = "results.csv";
pub const EINFO_FILE: &str = "einfo.xml";

/// 一次实验运行
pub struct ExperimentRun {
    /// 实验目录
    pub result_path: PathBuf,
    /// 配置快照
    pub config: Config,
    /// 抽样得到的检索式（按抽中顺序）
    pub queries: Vec<Query>,
    /// hedge 定义，所有 worker 只读共享
    pub hedges: Arc<[HedgeDefinition]>,
    /// 实际使用的抽样种子
    pub seed: u64,
    pub error_log: Arc<ErrorLog>,
    /// 全局错误计数，只通过原子加一修改
    pub error_count: Arc<AtomicUsize>,
}

impl ExperimentRun {
    /// 准备实验
    ///
    /// # 参数
    /// - `config`: 已校验的配置
    /// - `experiment`: 实验目录名，None 时使用当前时间
    pub async fn setup(config: Config, experiment: Option<&str>) -> AppResult<Self> {
        info!("\n📁 正在加载输入文件...");
        let hedges = load_hedges(Path::new(&config.hedge_path)).await?;
        let candidates = load_queries(Path::new(&config.data_path), config.delimiter()).await?;

        let sample = sample_queries(&candidates, config.num_queries, config.sampling_seed())?;
        info!(
            "✓ 从 {} 条候选检索式中抽取 {} 条 (种子: {})",
            candidates.len(),
            sample.queries.len(),
            sample.seed
        );

        let name = experiment
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Local::now().format("%Y%m%dT%H%M%S").to_string());
        let result_path = create_experiment_dir(Path::new(&config.result_path), &name).await?;

        write_queries(&result_path.join(QUERIES_FILE), &sample.queries)?;
        let seed_path = result_path.join(SEED_FILE);
        fs::write(&seed_path, format!("{}\n", sample.seed))
            .await
            .map_err(|e| SetupError::io(seed_path.display().to_string(), e))?;

        let log_path = result_path.join(ERROR_LOG_FILE);
        let error_log = ErrorLog::create(&log_path)
            .await
            .map_err(|e| SetupError::io(log_path.display().to_string(), e))?;

        info!("✓ 实验目录: {}", result_path.display());

        Ok(Self {
            result_path,
            config,
            queries: sample.queries,
            hedges: hedges.into(),
            seed: sample.seed,
            error_log: Arc::new(error_log),
            error_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 当前错误总数
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// 记录一个错误
    pub fn add_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// 创建实验目录，已存在时报错
async fn create_experiment_dir(root: &Path, name: &str) -> Result<PathBuf, SetupError> {
    fs::create_dir_all(root)
        .await
        .map_err(|e| SetupError::io(root.display().to_string(), e))?;

    let path = root.join(name);
    match fs::create_dir(&path).await {
        Ok(()) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(SetupError::ExperimentExists {
                path: path.display().to_string(),
            })
        }
        Err(e) => Err(SetupError::io(path.display().to_string(), e)),
    }
}

/// 写出抽样结果
fn write_queries(path: &Path, queries: &[Query]) -> Result<(), SetupError> {
    let display = path.display().to_string();
    let mut writer = csv::Writer::from_path(path).map_err(|e| SetupError::csv(&display, e))?;
    for query in queries {
        writer
            .serialize(query)
            .map_err(|e| SetupError::csv(&display, e))?;
    }
    writer
        .flush()
        .map_err(|e| SetupError::io(display.clone(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
    }

    fn fixture(queries: &str, hedges: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.tsv");
        let hedge = dir.path().join("hedges.csv");
        std::fs::write(&data, queries).unwrap();
        std::fs::write(&hedge, hedges).unwrap();

        let config = Config {
            data_path: data.display().to_string(),
            hedge_path: hedge.display().to_string(),
            result_path: dir.path().join("results").display().to_string(),
            num_queries: 2,
            seed: 42,
            ..Config::default()
        };
        Fixture { dir, config }
    }

    const QUERIES: &str = "query_term\nasthma\ncopd\nasthma\n\ndiabetes\n";
    const HEDGES: &str = "Shortcode,Hedge_text\nfemale,female[mh]\n";

    #[tokio::test]
    async fn test_setup_persists_sample_and_seed() {
        let f = fixture(QUERIES, HEDGES);
        let run = ExperimentRun::setup(f.config.clone(), Some("exp1")).await.unwrap();

        assert_eq!(run.result_path, f.dir.path().join("results").join("exp1"));
        assert_eq!(run.queries.len(), 2);
        assert_eq!(run.hedges.len(), 1);
        assert_eq!(run.seed, 42);
        assert_eq!(run.error_count(), 0);

        let seed = std::fs::read_to_string(run.result_path.join(SEED_FILE)).unwrap();
        assert_eq!(seed.trim(), "42");

        let queries = std::fs::read_to_string(run.result_path.join(QUERIES_FILE)).unwrap();
        let lines: Vec<_> = queries.lines().collect();
        assert_eq!(lines[0], "search_index,query_term");
        assert_eq!(lines.len(), 3);
        assert!(run.result_path.join(ERROR_LOG_FILE).exists());
    }

    #[tokio::test]
    async fn test_same_seed_same_sample_across_runs() {
        let f = fixture(QUERIES, HEDGES);
        let a = ExperimentRun::setup(f.config.clone(), Some("a")).await.unwrap();
        let b = ExperimentRun::setup(f.config.clone(), Some("b")).await.unwrap();
        assert_eq!(a.queries, b.queries);
    }

    #[tokio::test]
    async fn test_existing_experiment_dir_is_fatal() {
        let f = fixture(QUERIES, HEDGES);
        ExperimentRun::setup(f.config.clone(), Some("dup")).await.unwrap();
        let err = ExperimentRun::setup(f.config.clone(), Some("dup"))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AppError::Setup(SetupError::ExperimentExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_too_few_queries_fails_before_creating_dir() {
        let f = fixture(QUERIES, HEDGES);
        let config = Config {
            num_queries: 10,
            ..f.config.clone()
        };
        let err = ExperimentRun::setup(config, Some("big")).await.err().unwrap();
        assert!(matches!(
            err,
            AppError::Setup(SetupError::NotEnoughQueries { available: 3, .. })
        ));
        assert!(!f.dir.path().join("results").join("big").exists());
    }
}
