pub mod challenges;
pub mod config;
pub mod progress;
pub mod redis;
pub mod types;
