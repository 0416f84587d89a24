use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("配置错误: {0}")]
    Config(String),
    #[error("SQLx 错误: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("未找到记录")]
    NotFound,
    #[error("唯一约束冲突: {0}")]
    UniqueViolation(String),
    #[error("事务错误: {0}")]
    Tx(String),
}

impl DbError {
    /// 把 sqlx 错误归类（唯一约束冲突、未找到、其他）
    /// Classify a sqlx error (unique violation, row not found, other)
    pub fn classify(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::UniqueViolation(db.message().to_string())
            }
            other => DbError::Sqlx(other),
        }
    }
}

/// 获取详细错误描述（中英文） / Get detailed error description (CN/EN)
pub fn describe_error(e: &DbError) -> String {
    match e {
        DbError::Config(msg) => format!("配置错误 / Config error: {}", msg),
        DbError::Sqlx(err) => format!("SQLx 错误 / SQLx error: {}", err),
        DbError::NotFound => "未找到记录 / Record not found".to_string(),
        DbError::UniqueViolation(msg) => format!("唯一约束冲突 / Unique violation: {}", msg),
        DbError::Tx(msg) => format!("事务错误 / Transaction error: {}", msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            DbError::classify(sqlx::Error::RowNotFound),
            DbError::NotFound
        ));
    }

    #[test]
    fn describe_is_bilingual() {
        let text = describe_error(&DbError::UniqueViolation("threads_key".to_string()));
        assert!(text.contains("Unique violation"));
        assert!(text.contains("threads_key"));
    }
}
