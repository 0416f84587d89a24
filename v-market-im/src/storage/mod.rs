//! 存储模块 / Storage Module
//!
//! `ImStore` 与 `UserDirectory` 是消息核心依赖的两个外部协作者；
//! 内存实现用于开发与测试，PostgreSQL 实现用于生产
//! `ImStore` and `UserDirectory` are the two collaborators the messaging core depends on;
//! the in-memory implementation serves development and tests, PostgreSQL serves production

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{MemoryDirectory, MemoryStore};
pub use postgres::{PgDirectory, PgStore};
pub use traits::{ImStore, UserDirectory};

/// 当前毫秒时间戳 / Current unix millis
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 下一个严格递增的消息时间戳 / Next strictly increasing message timestamp
pub(crate) fn next_timestamp(last_created_at: Option<i64>) -> i64 {
    let now = now_millis();
    match last_created_at {
        Some(last) if last >= now => last + 1,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_never_go_backwards() {
        let future = now_millis() + 60_000;
        assert_eq!(next_timestamp(Some(future)), future + 1);
        let past = now_millis() - 60_000;
        assert!(next_timestamp(Some(past)) > past);
        assert!(next_timestamp(None) > 0);
    }
}
