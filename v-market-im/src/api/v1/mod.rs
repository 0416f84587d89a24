pub mod contact;
pub mod health;
pub mod message;
pub mod thread;
