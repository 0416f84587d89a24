//! 业务服务层 / Service layer

pub mod auth;
pub mod health;
pub mod identity;
pub mod inbox;
pub mod message_log;
pub mod messaging;
pub mod notifier;
pub mod read_state;
pub mod thread_store;
pub mod view;

pub use auth::{AuthCenterIdentityProvider, DirectoryIdentityProvider, IdentityProvider};
pub use messaging::{MessagingService, MessagingSettings};
pub use notifier::{ChangeEvent, ChangeNotifier, Subscription, Topic};
pub use view::{InboxView, RetryPolicy, ThreadView};
