use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::backfill::latency::{LatencyStats, Percentiles};
use crate::backfill::locks::GameLocks;
use crate::config::Config;
use crate::db::{GameReader, ResultWriter};
use crate::engine::derive_game;
use crate::error::{AppError, EngineError, Result};
use crate::leaderboard::aggregate_team_records;
use crate::types::League;

/// What happened to one game in a batch.
#[derive(Debug)]
enum Outcome {
    Derived { season: String },
    Skipped(EngineError),
    Failed(AppError),
}

/// Counts and latency for one backfill batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub pending: usize,
    pub derived: usize,
    pub skipped_data_integrity: usize,
    pub skipped_invalid_state: usize,
    pub skipped_unavailable: usize,
    pub failed: usize,
    pub seasons_updated: usize,
    pub latency: Percentiles,
}

impl BatchSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_data_integrity + self.skipped_invalid_state + self.skipped_unavailable
    }
}

/// Background task that derives R69 records for final games that have none
/// yet (or whose data changed since), then refreshes season team stats.
pub struct Backfill {
    reader: GameReader,
    writer: ResultWriter,
    locks: GameLocks,
    latency: Arc<LatencyStats>,
    interval_secs: u64,
    concurrency: usize,
    batch_size: i64,
    season: Option<String>,
    league: Option<League>,
}

impl Backfill {
    pub fn new(pool: sqlx::SqlitePool, cfg: &Config) -> Self {
        Self {
            reader: GameReader::new(pool.clone()),
            writer: ResultWriter::new(pool),
            locks: GameLocks::new(),
            latency: Arc::new(LatencyStats::new()),
            interval_secs: cfg.backfill_interval_secs,
            concurrency: cfg.backfill_concurrency.max(1),
            batch_size: cfg.backfill_batch_size,
            season: cfg.season.clone(),
            league: cfg.league,
        }
    }

    /// Run one batch per interval, forever. Batch errors are logged and the
    /// loop keeps going.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));

        loop {
            interval.tick().await;
            if let Err(e) = self.run_batch().await {
                error!("Backfill error: {e}");
            }
        }
    }

    pub async fn run_batch(&self) -> Result<BatchSummary> {
        self.latency.reset();

        let pending = self
            .reader
            .pending_final_games(self.batch_size, self.season.as_deref(), self.league)
            .await?;

        let outcomes: Vec<(String, Outcome)> = stream::iter(pending.iter().cloned())
            .map(|game_id| async move {
                let outcome = self.derive_one(&game_id).await;
                (game_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = BatchSummary {
            pending: pending.len(),
            ..Default::default()
        };
        let mut seasons = BTreeSet::new();

        for (game_id, outcome) in outcomes {
            match outcome {
                Outcome::Derived { season } => {
                    summary.derived += 1;
                    seasons.insert(season);
                }
                Outcome::Skipped(e) => {
                    match &e {
                        EngineError::DataIntegrity { .. } => {
                            summary.skipped_data_integrity += 1;
                            warn!(game_id = %game_id, kind = e.kind(), "skipping game: {e}");
                        }
                        EngineError::InvalidState { .. } => {
                            summary.skipped_invalid_state += 1;
                            debug!(game_id = %game_id, kind = e.kind(), "skipping game: {e}");
                        }
                        EngineError::Unavailable { .. } => {
                            summary.skipped_unavailable += 1;
                            debug!(game_id = %game_id, kind = e.kind(), "skipping game: {e}");
                        }
                    }
                }
                Outcome::Failed(e) => {
                    summary.failed += 1;
                    error!(game_id = %game_id, "derivation failed: {e}");
                }
            }
        }

        for season in &seasons {
            self.refresh_team_stats(season).await?;
        }
        summary.seasons_updated = seasons.len();
        summary.latency = self.latency.percentiles();
        self.locks.prune();

        info!(
            pending = summary.pending,
            derived = summary.derived,
            skipped_data_integrity = summary.skipped_data_integrity,
            skipped_invalid_state = summary.skipped_invalid_state,
            failed = summary.failed,
            seasons = summary.seasons_updated,
            "Backfill batch | derived: {} | skipped: {} | failed: {} | p50: {} | p95: {} | p99: {}",
            summary.derived,
            summary.skipped(),
            summary.failed,
            fmt_us(summary.latency.p50_us),
            fmt_us(summary.latency.p95_us),
            fmt_us(summary.latency.p99_us),
        );
        Ok(summary)
    }

    async fn derive_one(&self, game_id: &str) -> Outcome {
        let _guard = self.locks.acquire(game_id).await;

        let snapshot = match self.reader.fetch_snapshot(game_id).await {
            Ok(s) => s,
            Err(e) => return Outcome::Failed(e),
        };

        let started = Instant::now();
        let derived = derive_game(&snapshot);
        self.latency.record(started.elapsed());

        let derivation = match derived {
            Ok(d) => d,
            Err(e) => return self.skip(game_id, e).await,
        };

        match self.writer.write_derivation(&snapshot.game, &derivation, now_ns()).await {
            Ok(()) => Outcome::Derived {
                season: snapshot.game.season,
            },
            Err(AppError::Engine(e)) => self.skip(game_id, e).await,
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Park a game the engine rejected until its data changes.
    async fn skip(&self, game_id: &str, error: EngineError) -> Outcome {
        match self.writer.record_failure(game_id, &error, now_ns()).await {
            Ok(()) => Outcome::Skipped(error),
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Recompute and store every team's record for `season`.
    async fn refresh_team_stats(&self, season: &str) -> Result<()> {
        let games = self.reader.final_games_for_season(season).await?;
        let events = self.reader.primary_r69_events_for_season(season).await?;
        let records = aggregate_team_records(&games, &events);
        self.writer.upsert_team_stats(&records, now_ns()).await?;
        debug!(season, teams = records.len(), "team stats refreshed");
        Ok(())
    }
}

fn fmt_us(us: Option<u64>) -> String {
    us.map(|v| format!("{v}us")).unwrap_or_else(|| "n/a".to_string())
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::engine::test_support::{final_game, live_game, stream, GAME_ID, HOME};
    use crate::types::Game;

    fn config() -> Config {
        Config {
            log_level: "info".to_string(),
            db_path: ":memory:".to_string(),
            backfill_interval_secs: 0,
            backfill_concurrency: 4,
            backfill_batch_size: 100,
            season: None,
            league: None,
        }
    }

    fn game(id: &str, home: i32, away: i32) -> Game {
        Game {
            id: id.to_string(),
            ..final_game(home, away)
        }
    }

    fn events_for(id: &str, snapshots: &[(i64, i32, i32)]) -> Vec<crate::types::PlayByPlayEvent> {
        stream(snapshots)
            .into_iter()
            .map(|mut e| {
                e.game_id = id.to_string();
                e
            })
            .collect()
    }

    /// Store a game as live with its events, then flip it to final.
    async fn seed(writer: &ResultWriter, game: &Game, snapshots: &[(i64, i32, i32)]) {
        let live = Game {
            status: crate::types::GameStatus::InProgress,
            ..game.clone()
        };
        writer.upsert_game(&live, 1).await.unwrap();
        writer
            .append_events(&game.id, &events_for(&game.id, snapshots), 1)
            .await
            .unwrap();
        writer.upsert_game(game, 2).await.unwrap();
    }

    #[tokio::test]
    async fn batch_derives_pending_games_and_refreshes_team_stats() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone());
        let reader = GameReader::new(pool.clone());

        seed(&writer, &game("g1", 84, 79), &[(1200, 69, 61), (2400, 84, 79)]).await;
        seed(&writer, &game("g2", 72, 80), &[(1800, 69, 60), (2400, 72, 80)]).await;
        seed(&writer, &game("g3", 60, 58), &[(2400, 60, 58)]).await;

        let backfill = Backfill::new(pool, &config());
        let summary = backfill.run_batch().await.unwrap();
        assert_eq!(summary.pending, 3);
        assert_eq!(summary.derived, 3);
        assert_eq!(summary.skipped(), 0);
        assert_eq!(summary.seasons_updated, 1);
        assert!(summary.latency.p50_us.is_some());

        let stats = reader.team_stats("2024-25").await.unwrap();
        let home = stats.iter().find(|r| r.team_id == HOME).unwrap();
        assert_eq!(home.games_played, 3);
        assert_eq!(home.r69_wins, 1);
        assert_eq!(home.r69_losses, 1);

        // Nothing left to do until a game changes.
        let again = backfill.run_batch().await.unwrap();
        assert_eq!(again.pending, 0);
    }

    #[tokio::test]
    async fn integrity_failures_are_skipped_not_fatal() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone());

        // Tied final score cannot resolve an R69 winner.
        seed(&writer, &game("tied", 75, 75), &[(1500, 69, 60), (2400, 75, 75)]).await;
        seed(&writer, &game("ok", 70, 60), &[(2000, 69, 60), (2400, 70, 60)]).await;

        let summary = Backfill::new(pool, &config()).run_batch().await.unwrap();
        assert_eq!(summary.derived, 1);
        assert_eq!(summary.skipped_data_integrity, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn rejected_games_do_not_block_newer_ones() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone());
        let reader = GameReader::new(pool.clone());

        let bad = Game {
            game_date: "2025-01-01".to_string(),
            ..game("bad", 75, 75)
        };
        let good = Game {
            game_date: "2025-01-02".to_string(),
            ..game("good", 70, 60)
        };
        seed(&writer, &bad, &[(1500, 69, 60), (2400, 75, 75)]).await;
        seed(&writer, &good, &[(2000, 69, 60), (2400, 70, 60)]).await;

        let backfill = Backfill::new(
            pool,
            &Config {
                backfill_batch_size: 1,
                ..config()
            },
        );
        let mut derived = 0;
        for _ in 0..3 {
            derived += backfill.run_batch().await.unwrap().derived;
        }
        assert_eq!(derived, 1);
        assert!(reader.analytics_for_game("good").await.unwrap().is_some());

        let (kind, _) = reader.derive_failure("bad").await.unwrap().unwrap();
        assert_eq!(kind, "data_integrity");
        assert!(reader.pending_final_games(10, None, None).await.unwrap().is_empty());

        // A corrected score makes the game eligible again and clears the failure.
        writer
            .upsert_game(&Game { home_score: Some(77), ..bad }, now_ns() + 1_000_000_000)
            .await
            .unwrap();
        assert_eq!(reader.pending_final_games(10, None, None).await.unwrap(), vec!["bad".to_string()]);
        assert_eq!(backfill.run_batch().await.unwrap().derived, 1);
        assert!(reader.derive_failure("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn live_games_are_not_pending() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone());
        writer.upsert_game(&live_game(40, 30), 1).await.unwrap();

        let summary = Backfill::new(pool, &config()).run_batch().await.unwrap();
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.seasons_updated, 0);
    }

    #[tokio::test]
    async fn updated_game_is_derived_again() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone());
        let reader = GameReader::new(pool.clone());
        seed(&writer, &game(GAME_ID, 70, 60), &[(2000, 69, 60), (2400, 70, 60)]).await;

        let backfill = Backfill::new(pool, &config());
        assert_eq!(backfill.run_batch().await.unwrap().derived, 1);

        writer.upsert_game(&game(GAME_ID, 70, 60), now_ns() + 1_000_000_000).await.unwrap();
        let pending = reader.pending_final_games(10, None, None).await.unwrap();
        assert_eq!(pending, vec![GAME_ID.to_string()]);
        assert_eq!(backfill.run_batch().await.unwrap().derived, 1);
    }
}
