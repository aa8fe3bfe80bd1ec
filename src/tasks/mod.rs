//! Background Tasks Module
//!
//! Contains the background task that runs alongside a cache.
//!
//! # Tasks
//! - Expiration sweeper: removes expired entries at a fixed interval and
//!   delivers expired keys to the user hook

mod sweeper;

pub(crate) use sweeper::SweeperHandle;
