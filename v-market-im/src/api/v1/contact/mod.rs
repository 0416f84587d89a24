pub mod list;
pub mod unread;
