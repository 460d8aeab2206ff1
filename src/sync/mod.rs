//! Inter-task communication
//!
//! Contains the single-slot mailbox queues.

pub mod queue;
