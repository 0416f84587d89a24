use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FieldError {
    pub resource: String,
    pub field: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GitHub 风格错误体 / GitHub-style error body
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub message: String,
    /// 机器可读错误码 / Machine readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// 客户端是否可以重试 / Whether the client may retry
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone)]
pub enum HttpError {
    Unauthorized(String),
    Forbidden { code: String, message: String },
    NotFound(String),
    Validation(Vec<FieldError>),
    Unavailable(String),
    Internal(String),
}

impl HttpError {
    pub fn status_code(&self) -> u16 {
        match self {
            HttpError::Unauthorized(_) => 401,
            HttpError::Forbidden { .. } => 403,
            HttpError::NotFound(_) => 404,
            HttpError::Validation(_) => 422,
            HttpError::Unavailable(_) => 503,
            HttpError::Internal(_) => 500,
        }
    }

    /// 单字段校验错误 / Single-field validation error
    pub fn validation(resource: &str, field: &str, code: &str, message: impl Into<String>) -> Self {
        HttpError::Validation(vec![FieldError {
            resource: resource.to_string(),
            field: field.to_string(),
            code: code.to_string(),
            message: Some(message.into()),
        }])
    }

    pub fn to_body(&self) -> ErrorBody {
        match self {
            HttpError::Unauthorized(msg) => ErrorBody {
                message: msg.clone(),
                code: Some("unauthenticated".to_string()),
                retryable: false,
                errors: None,
            },
            HttpError::Forbidden { code, message } => ErrorBody {
                message: message.clone(),
                code: Some(code.clone()),
                retryable: false,
                errors: None,
            },
            HttpError::NotFound(msg) => ErrorBody {
                message: msg.clone(),
                code: Some("not_found".to_string()),
                retryable: false,
                errors: None,
            },
            HttpError::Validation(errors) => ErrorBody {
                message: "Validation Failed".to_string(),
                code: errors.first().map(|e| e.code.clone()),
                retryable: false,
                errors: Some(errors.clone()),
            },
            HttpError::Unavailable(msg) => ErrorBody {
                message: msg.clone(),
                code: Some("transient_store_error".to_string()),
                retryable: true,
                errors: None,
            },
            HttpError::Internal(msg) => ErrorBody {
                message: msg.clone(),
                code: None,
                retryable: false,
                errors: None,
            },
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            HttpError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
            HttpError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            HttpError::Validation(_) => write!(f, "Validation Failed"),
            HttpError::Unavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            HttpError::Internal(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_body_serialization() {
        let e = HttpError::validation("Message", "content", "empty_message", "must not be blank");
        let body = e.to_body();
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("Validation Failed"));
        assert!(json.contains("content"));
        assert_eq!(e.status_code(), 422);
        assert_eq!(body.code.as_deref(), Some("empty_message"));
        assert_eq!(body.errors.unwrap().len(), 1);
    }

    #[test]
    fn unavailable_is_retryable() {
        let body = HttpError::Unavailable("store down".to_string()).to_body();
        assert!(body.retryable);
        assert!(!HttpError::NotFound("thread".to_string()).to_body().retryable);
    }
}
