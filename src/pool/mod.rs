// src/pool/mod.rs
mod dispatcher;
mod worker;

pub use dispatcher::{DispatchError, Dispatcher};
pub use worker::WorkItem;
