// src/target/mod.rs
mod address;

pub use address::{from_env, parse_target, parse_targets, Address};
