//! Vigil Sync - Fleet-wide broadcast of schedule-change events
//!
//! Every instance subscribes to the same logical channel, and every
//! published payload reaches every subscriber, the publisher included.

pub mod channel;
pub mod error;
pub mod memory;
pub mod redis_backend;

// Re-export commonly used types
pub use channel::{EventStream, SyncChannel};
pub use error::{Result, SyncError};
pub use memory::MemoryChannel;
pub use redis_backend::RedisChannel;
