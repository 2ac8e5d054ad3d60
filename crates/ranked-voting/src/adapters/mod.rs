//! Adapters for Ranked Voting
//!
//! Implementations of the outbound ports (stores and clocks).

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
mod time;

pub use memory::MemoryVotingStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisVotingStore;
pub use time::{ManualTimeSource, SystemTimeSource};
