//! 会话标识解析 / Thread identity resolution
//!
//! 纯函数：同一无序参与者对 + 可选商品，始终得到同一个键
//! Pure functions: one unordered participant pair + optional product always maps to one key

use crate::domain::Role;
use crate::error::{ImError, ImResult};

/// 会话规范键 / Canonical thread key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    pub participant_low: String,
    pub participant_high: String,
    pub product_id: Option<String>,
}

impl ThreadKey {
    /// 稳定字符串形式 `low|high|product`（无商品时为 `-`）
    /// Stable string form `low|high|product` (`-` when there is no product)
    pub fn as_string(&self) -> String {
        format!(
            "{}|{}|{}",
            self.participant_low,
            self.participant_high,
            self.product_id.as_deref().unwrap_or("-")
        )
    }
}

impl std::fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// 解析会话键 / Resolve the thread key for a pair and optional product
///
/// 空白 ID 或自己对自己返回 `InvalidParticipants`；空商品 ID 视为无商品
/// Blank ids or a self-thread yield `InvalidParticipants`; a blank product id means no product
pub fn resolve_thread_key(a: &str, b: &str, product_id: Option<&str>) -> ImResult<ThreadKey> {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return Err(ImError::InvalidParticipants(
            "participant id must not be empty".to_string(),
        ));
    }
    if a == b {
        return Err(ImError::InvalidParticipants(format!(
            "cannot open a thread with yourself ({})",
            a
        )));
    }
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    let product_id = product_id
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    Ok(ThreadKey {
        participant_low: low.to_string(),
        participant_high: high.to_string(),
        product_id,
    })
}

/// 角色组合校验（仅在创建会话时调用）
/// Role pair validation, checked only when a thread is created
///
/// 允许 buyer–seller、buyer–admin、seller–admin；同角色组合一律拒绝
/// Allows buyer–seller, buyer–admin and seller–admin; every same-role pair is rejected
pub fn check_role_pair(first: Role, second: Role) -> ImResult<()> {
    match (first, second) {
        (Role::Buyer, Role::Seller)
        | (Role::Seller, Role::Buyer)
        | (Role::Buyer, Role::Admin)
        | (Role::Admin, Role::Buyer)
        | (Role::Seller, Role::Admin)
        | (Role::Admin, Role::Seller) => Ok(()),
        _ => Err(ImError::ForbiddenPair { first, second }),
    }
}
