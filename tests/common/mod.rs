#![allow(dead_code)]

pub mod builders;
pub mod signallers;
pub mod strategies;

pub use builders::*;
pub use signallers::*;
