pub mod action;
pub mod chat;
pub mod config;
pub mod data_url;
pub mod provider;
pub mod stream;
pub mod types;

pub use types::*;
