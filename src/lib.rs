// src/lib.rs
pub mod checks;
pub mod config;
pub mod context;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod scheduler;
pub mod server;
pub mod target;
