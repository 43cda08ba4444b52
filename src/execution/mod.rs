//! # Execution
//!
//! Concurrency primitives for delivering records to the process engine.

pub mod worker_pool;

pub use worker_pool::DispatchWorkerPool;
