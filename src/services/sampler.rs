//! 检索式抽样服务
//!
//! 给定种子时结果可复现；未给定时随机生成一个种子并返回，便于事后复现

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::SetupError;
use crate::models::Query;

/// 抽样结果
#[derive(Debug, Clone)]
pub struct Sample {
    /// 实际使用的种子
    pub seed: u64,
    /// 按抽中顺序排列
    pub queries: Vec<Query>,
}

/// 从候选检索式中抽取 `amount` 条
///
/// # 参数
/// - `candidates`: 去重后的候选检索式
/// - `amount`: 抽取数量，超过候选数量时报错
/// - `seed`: 抽样种子，None 表示随机
pub fn sample_queries(
    candidates: &[Query],
    amount: usize,
    seed: Option<u64>,
) -> Result<Sample, SetupError> {
    if amount > candidates.len() {
        return Err(SetupError::NotEnoughQueries {
            requested: amount,
            available: candidates.len(),
        });
    }

    // 随机种子限制在正的 i64 范围内，可以直接写回配置文件复现
    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen_range(1..=i64::MAX as u64));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let queries = index::sample(&mut rng, candidates.len(), amount)
        .into_iter()
        .map(|i| candidates[i].clone())
        .collect();

    Ok(Sample { seed, queries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(n: usize) -> Vec<Query> {
        (0..n).map(|i| Query::new(i, format!("term {}", i))).collect()
    }

    #[test]
    fn test_same_seed_same_sample() {
        let pool = candidates(100);
        let a = sample_queries(&pool, 10, Some(222918)).unwrap();
        let b = sample_queries(&pool, 10, Some(222918)).unwrap();
        assert_eq!(a.seed, 222918);
        assert_eq!(a.queries, b.queries);
    }

    #[test]
    fn test_different_seeds_differ() {
        let pool = candidates(1000);
        let a = sample_queries(&pool, 20, Some(1)).unwrap();
        let b = sample_queries(&pool, 20, Some(2)).unwrap();
        assert_ne!(a.queries, b.queries);
    }

    #[test]
    fn test_random_seed_is_recorded_and_reproducible() {
        let pool = candidates(50);
        let a = sample_queries(&pool, 5, None).unwrap();
        assert!(a.seed >= 1 && a.seed <= i64::MAX as u64);
        let b = sample_queries(&pool, 5, Some(a.seed)).unwrap();
        assert_eq!(a.queries, b.queries);
    }

    #[test]
    fn test_sample_has_no_duplicates() {
        let pool = candidates(30);
        let sample = sample_queries(&pool, 30, Some(7)).unwrap();
        let mut indexes: Vec<_> = sample.queries.iter().map(|q| q.search_index).collect();
        indexes.sort_unstable();
        assert_eq!(indexes, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_not_enough_queries() {
        let err = sample_queries(&candidates(3), 4, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            SetupError::NotEnoughQueries {
                requested: 4,
                available: 3
            }
        ));
    }
}
