//! Ports module for Ranked Voting
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use inbound::RankingApi;
pub use outbound::{CommitOutcome, Guard, TimeSource, Transaction, VotingStore, WriteOp};
