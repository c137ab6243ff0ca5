//! Durability and recovery: the local backlog and startup retry.

pub mod backlog;
pub mod retry;
