//! HTTP 接口 / HTTP API

pub mod identity;
pub mod v1;
