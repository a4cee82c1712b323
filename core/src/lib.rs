pub mod action;
pub mod archive;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod storage;
pub mod style;
pub mod submission;
pub mod testing;

pub use crate::config::Config;
