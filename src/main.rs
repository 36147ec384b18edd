use anyhow::Result;
use bestmatch_bias::utils::logging;
use bestmatch_bias::{App, Config};
use clap::Parser;
use std::path::PathBuf;

/// 运行 Best Match 偏倚检测实验
#[derive(Debug, Parser)]
#[command(name = "bestmatch_bias", version)]
struct Cli {
    /// 配置文件（TOML）
    #[arg(short, long, value_name = "CONFIG_PATH", value_parser = existing_path)]
    config: Option<PathBuf>,

    /// 实验目录名（位于 result_path 下，默认使用当前时间）
    #[arg(short, long, value_name = "EXPERIMENT_PATH")]
    experiment: Option<String>,
}

fn existing_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err("should be an existing file".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load(cli.config.as_deref())?;

    // 初始化并运行应用
    let _report = App::initialize(config, cli.experiment.as_deref())
        .await?
        .run()
        .await?;

    Ok(())
}
