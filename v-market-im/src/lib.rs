//! v-market-im：买家、卖家、管理员之间的消息核心
//! v-market-im: the buyer, seller and admin messaging core

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod router;
pub mod server;
pub mod service;
pub mod storage;
pub mod tasks;
pub mod ws;

pub use error::{ImError, ImResult};
pub use server::VMarketIMServer;
