pub mod connection;
pub mod error;
