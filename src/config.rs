use crate::error::{AppError, Result};
use crate::types::League;

/// The score a team has to reach first.
pub const R69_TARGET: i32 = 69;

/// Regulation length of an NCAA game in seconds (40 minutes, both leagues).
pub const REGULATION_SECONDS: i64 = 2_400;

/// Length of one overtime period in seconds.
pub const OVERTIME_SECONDS: i64 = 300;

/// Pace figures are normalized to a 40-minute game.
pub const PACE_NORMALIZATION_MINUTES: f64 = 40.0;

/// League-wide average time to reach 69, used by the R69 pace index.
pub const AVG_T_TO_69_SECS: f64 = 1_800.0;

/// Historical share of R69 teams that go on to win (percent).
pub const HISTORICAL_R69W_RATE: f64 = 73.0;

/// Plays within this many seconds of tTo69 count as the R69 play in key moments.
pub const KEY_MOMENT_R69_TOLERANCE_SECS: i64 = 5;

/// Maximum key moments returned for a game.
pub const KEY_MOMENTS_LIMIT: usize = 20;

/// Minimum R69 win percentage for the 69 Club.
pub const SIXTY_NINE_CLUB_MIN_WIN_PCT: f64 = 69.0;

/// Default minimum decided R69 games for 69 Club membership.
pub const SIXTY_NINE_CLUB_MIN_ATTEMPTS: u32 = 10;

/// Upper bound for a single page of games.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Backfill batch interval (seconds). 0 runs a single batch and exits.
pub const BACKFILL_INTERVAL_SECS: u64 = 300;

/// Games derived in parallel inside one batch.
pub const BACKFILL_CONCURRENCY: usize = 8;

/// Games fetched per batch.
pub const BACKFILL_BATCH_SIZE: i64 = 500;

/// Regulation periods per league: men play halves, women play quarters.
pub fn regulation_periods(league: League) -> u32 {
    match league {
        League::Mens => 2,
        League::Womens => 4,
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Seconds between backfill batches (BACKFILL_INTERVAL_SECS). 0 = one shot.
    pub backfill_interval_secs: u64,
    /// Max games derived concurrently per batch (BACKFILL_CONCURRENCY)
    pub backfill_concurrency: usize,
    /// Max games fetched per batch (BACKFILL_BATCH_SIZE)
    pub backfill_batch_size: i64,
    /// Restrict backfill to one season, e.g. "2024-25" (SEASON)
    pub season: Option<String>,
    /// Restrict backfill to one league (LEAGUE=mens|womens)
    pub league: Option<League>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let league = match std::env::var("LEAGUE") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<League>()
                    .map_err(|_| AppError::Config(format!("LEAGUE must be mens or womens, got {raw:?}")))?,
            ),
            _ => None,
        };

        let backfill_concurrency = std::env::var("BACKFILL_CONCURRENCY")
            .unwrap_or_else(|_| BACKFILL_CONCURRENCY.to_string())
            .parse::<usize>()
            .map_err(|_| AppError::Config("BACKFILL_CONCURRENCY must be a positive integer".to_string()))?;
        if backfill_concurrency == 0 {
            return Err(AppError::Config("BACKFILL_CONCURRENCY must be at least 1".to_string()));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "r69.db".to_string()),
            backfill_interval_secs: std::env::var("BACKFILL_INTERVAL_SECS")
                .unwrap_or_else(|_| BACKFILL_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("BACKFILL_INTERVAL_SECS must be a number of seconds".to_string()))?,
            backfill_concurrency,
            backfill_batch_size: parse_batch_size(std::env::var("BACKFILL_BATCH_SIZE").ok().as_deref())?,
            season: std::env::var("SEASON")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            league,
        })
    }
}

/// BACKFILL_BATCH_SIZE: unset means the default; anything else must be a
/// positive integer (SQLite reads a negative LIMIT as "no limit").
fn parse_batch_size(raw: Option<&str>) -> Result<i64> {
    let Some(raw) = raw else {
        return Ok(BACKFILL_BATCH_SIZE);
    };
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(AppError::Config(format!(
            "BACKFILL_BATCH_SIZE must be a positive integer, got {raw:?}"
        ))),
    }
}
