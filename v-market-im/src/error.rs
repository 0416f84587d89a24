use thiserror::Error;
use v::http::HttpError;
use v::DbError;

use crate::domain::Role;

/// 消息服务统一错误 / Messaging error taxonomy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImError {
    #[error("参与者无效 / invalid participants: {0}")]
    InvalidParticipants(String),

    #[error("角色组合不允许 / forbidden role pair: {first} and {second}")]
    ForbiddenPair { first: Role, second: Role },

    #[error("不是会话参与者 / {user_id} is not a participant of {thread_id}")]
    NotAParticipant { thread_id: String, user_id: String },

    #[error("消息内容为空 / message content is empty")]
    EmptyMessage,

    #[error("消息过长 / message too long: {len} > {max} chars")]
    MessageTooLong { len: usize, max: usize },

    #[error("资源未找到 / {resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("未认证 / unauthenticated")]
    Unauthenticated,

    /// 存储层唯一约束冲突，仅在服务内部使用
    /// Storage uniqueness conflict, never surfaced from the service
    #[error("唯一约束冲突 / conflict: {0}")]
    Conflict(String),

    #[error("存储暂时不可用 / transient store error: {0}")]
    TransientStore(String),
}

pub type ImResult<T> = std::result::Result<T, ImError>;

impl ImError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        ImError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn not_a_participant(thread_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        ImError::NotAParticipant {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
        }
    }

    /// 只有存储暂时性故障可以重试 / Only transient store failures are retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ImError::TransientStore(_))
    }

    /// 机器可读错误码 / Machine readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ImError::InvalidParticipants(_) => "invalid_participants",
            ImError::ForbiddenPair { .. } => "forbidden_pair",
            ImError::NotAParticipant { .. } => "not_a_participant",
            ImError::EmptyMessage => "empty_message",
            ImError::MessageTooLong { .. } => "message_too_long",
            ImError::NotFound { .. } => "not_found",
            ImError::Unauthenticated => "unauthenticated",
            ImError::Conflict(_) => "conflict",
            ImError::TransientStore(_) => "transient_store_error",
        }
    }
}

impl From<DbError> for ImError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UniqueViolation(msg) => ImError::Conflict(msg),
            DbError::NotFound => ImError::not_found("record", "-"),
            other => ImError::TransientStore(v::describe_error(&other)),
        }
    }
}

impl From<sqlx::Error> for ImError {
    fn from(e: sqlx::Error) -> Self {
        DbError::classify(e).into()
    }
}

impl From<ImError> for HttpError {
    fn from(e: ImError) -> Self {
        let message = e.to_string();
        match e {
            ImError::InvalidParticipants(_) => {
                HttpError::validation("Thread", "counterpart_id", e.code(), message)
            }
            ImError::EmptyMessage | ImError::MessageTooLong { .. } => {
                HttpError::validation("Message", "content", e.code(), message)
            }
            ImError::ForbiddenPair { .. } | ImError::NotAParticipant { .. } => HttpError::Forbidden {
                code: e.code().to_string(),
                message,
            },
            ImError::NotFound { .. } => HttpError::NotFound(message),
            ImError::Unauthenticated => HttpError::Unauthorized(message),
            ImError::TransientStore(_) => HttpError::Unavailable(message),
            ImError::Conflict(_) => HttpError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_retry() {
        assert!(ImError::TransientStore("timeout".into()).is_retryable());
        assert!(!ImError::EmptyMessage.is_retryable());
        assert!(!ImError::Unauthenticated.is_retryable());
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        let e: ImError = DbError::UniqueViolation("im_threads_key_uq".into()).into();
        assert_eq!(e, ImError::Conflict("im_threads_key_uq".into()));
    }

    #[test]
    fn http_mapping_follows_policy() {
        assert_eq!(HttpError::from(ImError::EmptyMessage).status_code(), 422);
        assert_eq!(
            HttpError::from(ImError::ForbiddenPair {
                first: Role::Seller,
                second: Role::Seller
            })
            .status_code(),
            403
        );
        assert_eq!(HttpError::from(ImError::Unauthenticated).status_code(), 401);
        let send_failure = HttpError::from(ImError::TransientStore("pool timed out".into()));
        assert_eq!(send_failure.status_code(), 503);
        assert!(send_failure.to_body().retryable);
    }
}
