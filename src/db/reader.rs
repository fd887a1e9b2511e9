use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::filter::GameFilter;
use crate::db::models::{AnalyticsRow, GameRow, PbpEventRow, R69EventRow, TeamStatsRow};
use crate::error::{AppError, Result};
use crate::leaderboard::NiceGame;
use crate::types::{Game, GameSnapshot, GameStatus, League, PlayByPlayEvent, R69Event};

const GAME_COLUMNS: &str = "id, league, season, game_date, home_team_id, away_team_id, \
     home_team_name, away_team_name, home_conference, away_conference, \
     home_score, away_score, status, total_periods, overtime";

const R69_COLUMNS: &str = "game_id, team_id, side, is_primary, t_to_69, period_at_69, margin_at_69, \
     score_at_69_team, score_at_69_opponent, team_score_at_trigger, sequence_number, r69w";

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, total: i64, filter: &GameFilter) -> Self {
        let page_size = i64::from(filter.page_size);
        Page {
            items,
            total,
            page: filter.page,
            page_size: filter.page_size,
            total_pages: (total + page_size - 1) / page_size,
        }
    }
}

/// Read side of the store. Hands the engine ordered snapshots.
#[derive(Clone)]
pub struct GameReader {
    pool: sqlx::SqlitePool,
}

impl GameReader {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_games(&self, filter: &GameFilter) -> Result<Page<Game>> {
        filter.validate()?;

        let mut count_qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM games");
        filter.push_where(&mut count_qb);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!("SELECT {GAME_COLUMNS} FROM games"));
        filter.push_where(&mut qb);
        filter.push_order_and_page(&mut qb);
        let rows: Vec<GameRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let items = rows.into_iter().map(Game::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, filter))
    }

    /// Final games where a team finished on exactly 69, or both finished on
    /// 69 or more. Paged and sorted like `list_games`; the status filter is
    /// always final.
    pub async fn nice_games(&self, filter: &GameFilter) -> Result<Page<NiceGame>> {
        filter.validate()?;
        let filter = GameFilter {
            status: Some(GameStatus::Final),
            ..filter.clone()
        };
        const NICE: &str = " AND (home_score = 69 OR away_score = 69 OR (home_score >= 69 AND away_score >= 69))";

        let mut count_qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM games");
        filter.push_where(&mut count_qb);
        count_qb.push(NICE);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!("SELECT {GAME_COLUMNS} FROM games"));
        filter.push_where(&mut qb);
        qb.push(NICE);
        filter.push_order_and_page(&mut qb);
        let rows: Vec<GameRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(nice) = NiceGame::classify(&Game::try_from(row)?) {
                items.push(nice);
            }
        }
        Ok(Page::new(items, total, &filter))
    }

    /// Game and events read inside one transaction so a live writer cannot
    /// interleave between the two reads.
    pub async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, GameRow>(&format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?"))
            .bind(game_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::GameNotFound(game_id.to_string()))?;

        let events = sqlx::query_as::<_, PbpEventRow>(
            r#"
            SELECT game_id, sequence_number, period, elapsed_seconds, team_id,
                   event_type, points_scored, home_score, away_score, description
            FROM pbp_events
            WHERE game_id = ?
            ORDER BY elapsed_seconds ASC, sequence_number ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(GameSnapshot {
            game: Game::try_from(row)?,
            events: events
                .into_iter()
                .map(PlayByPlayEvent::try_from)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Final games with no analytics yet, or updated since they were
    /// derived. Games whose last attempt failed wait until they change.
    pub async fn pending_final_games(
        &self,
        limit: i64,
        season: Option<&str>,
        league: Option<League>,
    ) -> Result<Vec<String>> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT g.id FROM games g \
             LEFT JOIN r69_analytics a ON a.game_id = g.id \
             LEFT JOIN derive_failures f ON f.game_id = g.id \
             WHERE g.status = 'final' \
             AND (a.game_id IS NULL OR a.derived_at < g.updated_at) \
             AND (f.game_id IS NULL OR f.attempted_at < g.updated_at)",
        );
        if let Some(season) = season {
            qb.push(" AND g.season = ").push_bind(season.to_string());
        }
        if let Some(league) = league {
            qb.push(" AND g.league = ").push_bind(league.to_string());
        }
        qb.push(" ORDER BY g.game_date ASC, g.id ASC LIMIT ").push_bind(limit);

        let ids: Vec<String> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(ids)
    }

    /// (kind, detail) of the last failed derivation, if any.
    pub async fn derive_failure(&self, game_id: &str) -> Result<Option<(String, String)>> {
        let row = sqlx::query_as::<_, (String, String)>("SELECT kind, detail FROM derive_failures WHERE game_id = ?")
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn final_games_for_season(&self, season: &str) -> Result<Vec<Game>> {
        let rows = sqlx::query_as::<_, GameRow>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE season = ? AND status = 'final' ORDER BY game_date ASC, id ASC"
        ))
        .bind(season)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Game::try_from).collect()
    }

    /// Primary R69 events for every game in `season`.
    pub async fn primary_r69_events_for_season(&self, season: &str) -> Result<Vec<R69Event>> {
        let rows = sqlx::query_as::<_, R69EventRow>(&format!(
            "SELECT {R69_COLUMNS} FROM r69_events \
             WHERE is_primary = 1 AND game_id IN (SELECT id FROM games WHERE season = ?) \
             ORDER BY game_id ASC"
        ))
        .bind(season)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(R69Event::try_from).collect()
    }

    pub async fn r69_events_for_game(&self, game_id: &str) -> Result<Vec<R69Event>> {
        let rows = sqlx::query_as::<_, R69EventRow>(&format!(
            "SELECT {R69_COLUMNS} FROM r69_events WHERE game_id = ? ORDER BY is_primary DESC, t_to_69 ASC"
        ))
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(R69Event::try_from).collect()
    }

    pub async fn analytics_for_game(&self, game_id: &str) -> Result<Option<AnalyticsRow>> {
        let row = sqlx::query_as::<_, AnalyticsRow>(
            r#"
            SELECT game_id, nice_score, double_nice, pace_index, r69_pace_index,
                   lead_duration, lead_duration_status, swing_margin, swing_margin_status,
                   comeback_69l, comeback_status, unavailable_reason, derived_at
            FROM r69_analytics
            WHERE game_id = ?
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn team_stats(&self, season: &str) -> Result<Vec<TeamStatsRow>> {
        let rows = sqlx::query_as::<_, TeamStatsRow>(
            r#"
            SELECT team_id, season, team_name, conference, league, games_played,
                   r69_wins, r69_losses, r69_win_pct, avg_t_to_69, avg_margin_at_69, updated_at
            FROM team_stats
            WHERE season = ?
            ORDER BY team_id ASC
            "#,
        )
        .bind(season)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
