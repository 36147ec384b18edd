//! 汇总结果表写入服务 - 业务能力层
//!
//! 只由编排层的收集循环调用，单写者，不需要加锁
//!
//! 一个检索单元的全部行先在内存中编码，再一次性写入文件，
//! 进程中途退出时文件里不会出现只写了一半的单元

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::models::{CaseResult, SortOrder};

/// results.csv 表头
pub const RESULTS_HEADER: [&str; 7] = [
    "search_index",
    "sort",
    "result_count",
    "return_count",
    "error_count",
    "bias_dimension",
    "bias_result_count",
];

/// 汇总结果表
pub struct ResultsWriter {
    file: File,
    rows: usize,
}

impl ResultsWriter {
    /// 创建结果表并写入表头
    pub fn create(path: &Path) -> csv::Result<Self> {
        let mut file = File::create(path)?;

        let mut header = csv::Writer::from_writer(Vec::new());
        header.write_record(RESULTS_HEADER)?;
        file.write_all(&into_bytes(header)?)?;
        file.flush()?;

        Ok(Self { file, rows: 0 })
    }

    /// 写入一个检索单元的全部行（每个 hedge 一行）
    ///
    /// 返回写入的行数
    pub fn write_case(
        &mut self,
        search_index: usize,
        sort: SortOrder,
        result: &CaseResult,
    ) -> csv::Result<usize> {
        let group = encode_case(search_index, sort, result)?;
        self.file.write_all(&group)?;
        self.file.flush()?;

        self.rows += result.bias_counts.len();
        Ok(result.bias_counts.len())
    }

    /// 关闭结果表，返回数据行总数
    pub fn finish(mut self) -> csv::Result<usize> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(self.rows)
    }
}

/// 把一个检索单元编码为完整的 CSV 行组
pub fn encode_case(
    search_index: usize,
    sort: SortOrder,
    result: &CaseResult,
) -> csv::Result<Vec<u8>> {
    let search_index = search_index.to_string();
    let result_count = result.result_count.to_string();
    let return_count = result.return_count.to_string();
    let error_count = result.error_count.to_string();

    let mut group = csv::Writer::from_writer(Vec::new());
    for bias in &result.bias_counts {
        group.write_record([
            search_index.as_str(),
            sort.as_param(),
            result_count.as_str(),
            return_count.as_str(),
            error_count.as_str(),
            bias.hedge_name.as_str(),
            bias.matched_count.to_string().as_str(),
        ])?;
    }
    into_bytes(group)
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> csv::Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BiasCount;

    fn case_with(hedges: Vec<(&str, usize)>) -> CaseResult {
        CaseResult {
            result_count: 100,
            return_count: 5,
            error_count: 1,
            bias_counts: hedges
                .into_iter()
                .map(|(name, matched_count)| BiasCount {
                    hedge_name: name.to_string(),
                    matched_count,
                })
                .collect(),
        }
    }

    #[test]
    fn test_write_case_rows_in_hedge_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut writer = ResultsWriter::create(&path).unwrap();

        let result = case_with(vec![("female", 3), ("aged, 80+", 0)]);
        assert_eq!(writer.write_case(4, SortOrder::DateDescending, &result).unwrap(), 2);
        assert_eq!(writer.finish().unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "search_index,sort,result_count,return_count,error_count,bias_dimension,bias_result_count",
                "4,date_desc,100,5,1,female,3",
                "4,date_desc,100,5,1,\"aged, 80+\",0",
            ]
        );
    }

    #[test]
    fn test_large_case_is_encoded_as_one_group() {
        let names: Vec<String> = (0..400)
            .map(|i| format!("hedge_{:04}_{}", i, "x".repeat(40)))
            .collect();
        let result = case_with(names.iter().map(|n| (n.as_str(), 1)).collect());

        // 超过 csv::Writer 默认 8 KiB 缓冲区
        let group = encode_case(9, SortOrder::Relevance, &result).unwrap();
        assert!(group.len() > 8 * 1024);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut writer = ResultsWriter::create(&path).unwrap();
        writer.write_case(9, SortOrder::Relevance, &result).unwrap();

        // 文件内容 = 表头 + 完整行组
        let content = std::fs::read(&path).unwrap();
        let header_len = content.iter().position(|b| *b == b'\n').unwrap() + 1;
        assert_eq!(&content[header_len..], group.as_slice());
        assert_eq!(writer.finish().unwrap(), 400);
    }
}
