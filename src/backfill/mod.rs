pub mod latency;
pub mod locks;
pub mod runner;

pub use latency::{LatencyStats, Percentiles};
pub use locks::GameLocks;
pub use runner::{Backfill, BatchSummary};
