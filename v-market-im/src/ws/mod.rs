//! WebSocket 推送服务 / WebSocket push server

pub mod connection;
pub mod forwarder;
pub mod handler;
pub mod sender;
pub mod server;
