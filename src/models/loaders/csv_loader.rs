use crate::error::SetupError;
use crate::models::hedge::HedgeDefinition;
use crate::models::query::Query;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// 检索式所在列
const QUERY_TERM_COLUMN: &str = "query_term";
/// hedge 简码列（两种表头都接受）
const HEDGE_NAME_COLUMNS: [&str; 2] = ["Shortcode", "BiasDimension"];
/// hedge 检索片段列
const HEDGE_TEXT_COLUMNS: [&str; 2] = ["Hedge_text", "SearchStrategy"];

async fn read_table(path: &Path) -> Result<Vec<u8>, SetupError> {
    if !path.exists() {
        return Err(SetupError::InputNotFound {
            path: path.display().to_string(),
        });
    }
    fs::read(path)
        .await
        .map_err(|e| SetupError::io(path.display().to_string(), e))
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| candidates.iter().any(|c| h.trim() == *c))
}

/// 加载候选检索式
///
/// - `search_index` 取数据行在文件中的位置（从 0 开始）
/// - 丢弃检索式为空的行
/// - 相同检索式只保留第一次出现的那行
pub async fn load_queries(path: &Path, delimiter: u8) -> Result<Vec<Query>, SetupError> {
    let content = read_table(path).await?;
    let display = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_slice());

    let headers = reader
        .headers()
        .map_err(|e| SetupError::csv(&display, e))?
        .clone();
    let column =
        find_column(&headers, &[QUERY_TERM_COLUMN]).ok_or_else(|| SetupError::MissingColumn {
            path: display.clone(),
            column: QUERY_TERM_COLUMN.to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut queries = Vec::new();
    let mut dropped_empty = 0usize;

    for (row_index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SetupError::csv(&display, e))?;
        let term = record.get(column).unwrap_or_default().trim();
        if term.is_empty() {
            dropped_empty += 1;
            continue;
        }
        if seen.insert(term.to_string()) {
            queries.push(Query::new(row_index, term));
        }
    }

    tracing::info!(
        "成功加载 {} 条检索式 (丢弃空检索式 {} 条)",
        queries.len(),
        dropped_empty
    );

    Ok(queries)
}

/// 加载 hedge 定义，简码重复时保留第一条
pub async fn load_hedges(path: &Path) -> Result<Vec<HedgeDefinition>, SetupError> {
    let content = read_table(path).await?;
    let display = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_slice());

    let headers = reader
        .headers()
        .map_err(|e| SetupError::csv(&display, e))?
        .clone();
    let name_col =
        find_column(&headers, &HEDGE_NAME_COLUMNS).ok_or_else(|| SetupError::MissingColumn {
            path: display.clone(),
            column: HEDGE_NAME_COLUMNS.join("/"),
        })?;
    let text_col =
        find_column(&headers, &HEDGE_TEXT_COLUMNS).ok_or_else(|| SetupError::MissingColumn {
            path: display.clone(),
            column: HEDGE_TEXT_COLUMNS.join("/"),
        })?;

    let mut seen = HashSet::new();
    let mut hedges = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| SetupError::csv(&display, e))?;
        let name = record.get(name_col).unwrap_or_default().trim();
        let text = record.get(text_col).unwrap_or_default().trim();
        if name.is_empty() || text.is_empty() {
            tracing::warn!("跳过不完整的 hedge 定义: {:?}", record);
            continue;
        }
        if !seen.insert(name.to_string()) {
            tracing::warn!("hedge 简码重复，保留第一条: {}", name);
            continue;
        }
        hedges.push(HedgeDefinition::new(name, text));
    }

    tracing::info!("成功加载 {} 个 hedge", hedges.len());

    Ok(hedges)
}
