use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::UserProfile;
use crate::error::{ImError, ImResult};
use crate::storage::UserDirectory;

/// 身份解析：令牌 -> 当前用户 / Identity resolution: token -> current user
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> ImResult<UserProfile>;
}

/// 开发/测试模式：令牌即用户ID，在目录中查找
/// Development/test mode: the token is the user id, looked up in the directory
pub struct DirectoryIdentityProvider {
    directory: Arc<dyn UserDirectory>,
}

impl DirectoryIdentityProvider {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl IdentityProvider for DirectoryIdentityProvider {
    async fn resolve(&self, token: &str) -> ImResult<UserProfile> {
        let uid = token.trim();
        if uid.is_empty() {
            return Err(ImError::Unauthenticated);
        }
        self.directory
            .lookup(uid)
            .await?
            .ok_or(ImError::Unauthenticated)
    }
}

/// 认证中心校验令牌 / Token validation against the auth center
///
/// `GET {center_url}/v1/sso/auth?token=...` 返回 `{id, role, display_name}`
pub struct AuthCenterIdentityProvider {
    client: reqwest::Client,
    center_url: String,
}

impl AuthCenterIdentityProvider {
    pub fn new(center_url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            client,
            center_url: center_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for AuthCenterIdentityProvider {
    async fn resolve(&self, token: &str) -> ImResult<UserProfile> {
        if token.trim().is_empty() {
            return Err(ImError::Unauthenticated);
        }
        let resp = self
            .client
            .get(format!("{}/v1/sso/auth", self.center_url))
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| {
                warn!("⚠️  auth center unreachable: {}", e);
                ImError::TransientStore(format!("auth center: {}", e))
            })?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(ImError::TransientStore(format!("auth center returned {}", status)));
        }
        if !status.is_success() {
            debug!("🔒 token rejected by auth center ({})", status);
            return Err(ImError::Unauthenticated);
        }
        resp.json::<UserProfile>().await.map_err(|e| {
            warn!("⚠️  auth center payload invalid: {}", e);
            ImError::Unauthenticated
        })
    }
}

/// 从 `Authorization: Bearer` 或 `X-User-Id` 取令牌
/// Take the token from `Authorization: Bearer` or `X-User-Id`
pub fn token_from_headers(
    authorization: Option<&str>,
    user_id_header: Option<&str>,
) -> Option<String> {
    let bearer = authorization
        .and_then(|v| v.trim().strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    bearer
        .or_else(|| user_id_header.map(str::trim).filter(|t| !t.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::storage::MemoryDirectory;

    #[tokio::test]
    async fn directory_provider_resolves_known_users() {
        let dir = Arc::new(MemoryDirectory::with_users(vec![UserProfile::new(
            "u1",
            Role::Buyer,
            "Asha",
        )]));
        let provider = DirectoryIdentityProvider::new(dir);
        assert_eq!(provider.resolve(" u1 ").await.unwrap().display_name, "Asha");
        assert_eq!(provider.resolve("ghost").await, Err(ImError::Unauthenticated));
        assert_eq!(provider.resolve("").await, Err(ImError::Unauthenticated));
    }

    #[test]
    fn bearer_wins_over_user_id_header() {
        assert_eq!(
            token_from_headers(Some("Bearer abc"), Some("u1")),
            Some("abc".to_string())
        );
        assert_eq!(token_from_headers(None, Some(" u1 ")), Some("u1".to_string()));
        assert_eq!(token_from_headers(Some("Basic xyz"), None), None);
        assert_eq!(token_from_headers(Some("Bearer  "), Some("")), None);
    }
}
