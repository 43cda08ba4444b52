//! # Registration
//!
//! Which deployments consume which topics, and whom a record must be delivered to.

pub mod table;
pub mod topics;

pub use table::{DispatchTarget, RegistrationTable};
pub use topics::TopicResolver;
