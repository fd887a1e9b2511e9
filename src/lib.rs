//! Race to 69: detect the moment a team first reaches 69 points, resolve
//! whether it went on to win, and derive per-game and per-team analytics.

pub mod backfill;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod types;
