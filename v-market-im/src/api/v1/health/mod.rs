pub mod basic;
pub mod live;
pub mod ready;
