//! 基础设施层
//!
//! 持有所有 worker 共享的稀缺资源，只暴露能力

pub mod rate_limiter;

pub use rate_limiter::RateLimiter;
