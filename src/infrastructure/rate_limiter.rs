//! 令牌桶限流器 - 基础设施层
//!
//! 所有对外请求共享同一个令牌桶：
//! - 令牌按 `rate` 个/秒连续补充，最多存 `capacity` 个
//! - 每次请求消耗一个完整令牌
//! - 令牌不足时挂起等待，从不返回错误

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// 令牌桶状态
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// 令牌桶限流器
///
/// 等待期间持有锁，后到的调用者按到达顺序排队
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    /// 创建限流器，初始时令牌桶是满的
    ///
    /// # 参数
    /// - `rate`: 每秒补充的令牌数（必须大于 0）
    /// - `capacity`: 令牌上限，小于 1 时按 1 处理
    pub fn new(rate: f64, capacity: f64) -> Self {
        let capacity = capacity.max(1.0);
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            rate,
            capacity,
        }
    }

    /// 按每秒请求数创建，突发上限与速率相同
    pub fn per_second(rate: u32) -> Self {
        Self::new(f64::from(rate), f64::from(rate))
    }

    /// 获取一个令牌，不足时等待补充
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        loop {
            state.refill(self.rate, self.capacity);
            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return;
            }
            let wait = (1.0 - state.tokens) / self.rate;
            sleep(Duration::from_secs_f64(wait)).await;
        }
    }

    /// 当前可用令牌数
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(self.rate, self.capacity);
        state.tokens
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
