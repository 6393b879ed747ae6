//! The RoadStack driver: owns the UDP socket, the estate registry, the
//! transaction table, and the keep store, and exposes the single
//! cooperative entry point, `service()`, that an embedding host drives at
//! whatever cadence it chooses.

mod config;
mod delivery;
mod error;
mod stack;
mod stats;

pub use config::StackConfig;
pub use delivery::Inbox;
pub use error::{RaetError, Result};
pub use stack::RoadStack;
pub use stats::{StackStats, StackStatsSnapshot};

pub use raet_transaction::Delivery;
