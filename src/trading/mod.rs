//! Live trading: order execution and the async control loops.

pub mod command;
pub mod coordinator;
pub mod locks;
pub mod schedule;
pub mod scheduler;
