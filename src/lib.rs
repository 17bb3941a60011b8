pub mod collectors;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod stats;
pub mod storage;
pub mod types;
pub mod validation;
