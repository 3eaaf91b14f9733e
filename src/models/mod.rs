pub mod config;
pub mod parameter;
pub mod payload;
