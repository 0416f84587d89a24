use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 会话记录 / Thread record
///
/// `participant_low` < `participant_high`（字典序）
/// `participant_low` < `participant_high` (lexicographic)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct Thread {
    pub id: String,
    pub participant_low: String,
    pub participant_high: String,
    pub product_id: Option<String>,
    /// 毫秒时间戳 / Unix millis
    pub created_at: i64,
    /// 每条新消息都会推进 / Bumped by every new message
    pub updated_at: i64,
}

impl Thread {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }

    /// 另一方参与者 / The other participant, `None` if `user_id` is not in the thread
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        if self.participant_low == user_id {
            Some(&self.participant_high)
        } else if self.participant_high == user_id {
            Some(&self.participant_low)
        } else {
            None
        }
    }
}
