use sqlx::SqliteConnection;
use tracing::debug;

use crate::engine::Derivation;
use crate::error::{AppError, EngineError, Result};
use crate::leaderboard::TeamR69Record;
use crate::types::{Derived, Game, PlayByPlayEvent, R69Analytics, R69Event};

/// Write side of the store. Every write is an idempotent upsert keyed on the
/// natural key, so re-deriving a game overwrites rather than duplicates.
#[derive(Clone)]
pub struct ResultWriter {
    pool: sqlx::SqlitePool,
}

impl ResultWriter {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a game's metadata. `updated_at` marks it for
    /// re-derivation when newer than its analytics.
    pub async fn upsert_game(&self, game: &Game, updated_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO games (
                id, league, season, game_date, home_team_id, away_team_id,
                home_team_name, away_team_name, home_conference, away_conference,
                home_score, away_score, status, total_periods, overtime, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                league = excluded.league,
                season = excluded.season,
                game_date = excluded.game_date,
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                home_team_name = excluded.home_team_name,
                away_team_name = excluded.away_team_name,
                home_conference = excluded.home_conference,
                away_conference = excluded.away_conference,
                home_score = excluded.home_score,
                away_score = excluded.away_score,
                status = excluded.status,
                total_periods = excluded.total_periods,
                overtime = excluded.overtime,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&game.id)
        .bind(game.league.to_string())
        .bind(&game.season)
        .bind(&game.game_date)
        .bind(&game.home_team_id)
        .bind(&game.away_team_id)
        .bind(&game.home_team_name)
        .bind(&game.away_team_name)
        .bind(&game.home_conference)
        .bind(&game.away_conference)
        .bind(game.home_score)
        .bind(game.away_score)
        .bind(game.status.to_string())
        .bind(i64::from(game.total_periods))
        .bind(game.overtime)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append play-by-play for a game that is still in progress. Replays of
    /// an already stored sequence number are ignored. Final games are sealed.
    pub async fn append_events(&self, game_id: &str, events: &[PlayByPlayEvent], updated_at: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM games WHERE id = ?")
            .bind(game_id)
            .fetch_optional(&mut *tx)
            .await?;
        match status.as_deref() {
            None => return Err(AppError::GameNotFound(game_id.to_string())),
            Some("final") => {
                return Err(EngineError::invalid_state(game_id, "play-by-play is sealed once the game is final").into())
            }
            Some(_) => {}
        }

        let mut inserted = 0;
        for event in events {
            if event.game_id != game_id {
                return Err(EngineError::data_integrity(
                    game_id,
                    format!("event {} belongs to game {}", event.sequence_number, event.game_id),
                )
                .into());
            }
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO pbp_events (
                    game_id, sequence_number, period, elapsed_seconds, team_id,
                    event_type, points_scored, home_score, away_score, description
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&event.game_id)
            .bind(event.sequence_number)
            .bind(i64::from(event.period))
            .bind(event.elapsed_seconds)
            .bind(&event.team_id)
            .bind(&event.event_type)
            .bind(event.points_scored)
            .bind(event.home_score)
            .bind(event.away_score)
            .bind(&event.description)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        sqlx::query("UPDATE games SET updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(game_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn upsert_r69_event(
        &self,
        event: &R69Event,
        is_primary: bool,
        final_margin: Option<i32>,
        derived_at: i64,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_r69_event(&mut conn, event, is_primary, final_margin, derived_at).await
    }

    pub async fn upsert_analytics(&self, analytics: &R69Analytics, derived_at: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_analytics(&mut conn, analytics, derived_at).await
    }

    /// Replace everything stored for one game with a fresh derivation, in one
    /// transaction. Readers see either the old rows or the new ones.
    pub async fn write_derivation(&self, game: &Game, derivation: &Derivation, derived_at: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM r69_events WHERE game_id = ?")
            .bind(&derivation.game_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM derive_failures WHERE game_id = ?")
            .bind(&derivation.game_id)
            .execute(&mut *tx)
            .await?;

        if let Some(primary) = &derivation.r69_event {
            upsert_r69_event(&mut tx, primary, true, game.final_margin(primary.side), derived_at).await?;
        }
        if let Some(secondary) = &derivation.secondary_event {
            upsert_r69_event(&mut tx, secondary, false, game.final_margin(secondary.side), derived_at).await?;
        }
        if let Some(analytics) = &derivation.analytics {
            upsert_analytics(&mut tx, analytics, derived_at).await?;
        }

        tx.commit().await?;
        debug!(game_id = %derivation.game_id, "derivation written");
        Ok(())
    }

    /// Remember that deriving `game_id` failed, so the backfill stops
    /// picking it until the game is updated again.
    pub async fn record_failure(&self, game_id: &str, error: &EngineError, attempted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO derive_failures (game_id, kind, detail, attempted_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(game_id) DO UPDATE SET
                kind = excluded.kind,
                detail = excluded.detail,
                attempted_at = excluded.attempted_at
            "#,
        )
        .bind(game_id)
        .bind(error.kind())
        .bind(error.to_string())
        .bind(attempted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_team_stats(&self, records: &[TeamR69Record], updated_at: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for r in records {
            sqlx::query(
                r#"
                INSERT INTO team_stats (
                    team_id, season, team_name, conference, league, games_played,
                    r69_wins, r69_losses, r69_win_pct, avg_t_to_69, avg_margin_at_69, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(team_id, season) DO UPDATE SET
                    team_name = excluded.team_name,
                    conference = excluded.conference,
                    league = excluded.league,
                    games_played = excluded.games_played,
                    r69_wins = excluded.r69_wins,
                    r69_losses = excluded.r69_losses,
                    r69_win_pct = excluded.r69_win_pct,
                    avg_t_to_69 = excluded.avg_t_to_69,
                    avg_margin_at_69 = excluded.avg_margin_at_69,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&r.team_id)
            .bind(&r.season)
            .bind(&r.team_name)
            .bind(&r.conference)
            .bind(r.league.to_string())
            .bind(i64::from(r.games_played))
            .bind(i64::from(r.r69_wins))
            .bind(i64::from(r.r69_losses))
            .bind(r.r69_win_pct)
            .bind(r.avg_t_to_69)
            .bind(r.avg_margin_at_69)
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_r69_event(
    conn: &mut SqliteConnection,
    event: &R69Event,
    is_primary: bool,
    final_margin: Option<i32>,
    derived_at: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO r69_events (
            game_id, team_id, side, is_primary, t_to_69, period_at_69, margin_at_69,
            score_at_69_team, score_at_69_opponent, team_score_at_trigger, sequence_number,
            r69w, final_margin, derived_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(game_id, team_id) DO UPDATE SET
            side = excluded.side,
            is_primary = excluded.is_primary,
            t_to_69 = excluded.t_to_69,
            period_at_69 = excluded.period_at_69,
            margin_at_69 = excluded.margin_at_69,
            score_at_69_team = excluded.score_at_69_team,
            score_at_69_opponent = excluded.score_at_69_opponent,
            team_score_at_trigger = excluded.team_score_at_trigger,
            sequence_number = excluded.sequence_number,
            r69w = excluded.r69w,
            final_margin = excluded.final_margin,
            derived_at = excluded.derived_at
        "#,
    )
    .bind(&event.game_id)
    .bind(&event.team_id)
    .bind(event.side.to_string())
    .bind(is_primary)
    .bind(event.t_to_69)
    .bind(i64::from(event.period_at_69))
    .bind(event.margin_at_69)
    .bind(event.score_at_69_team)
    .bind(event.score_at_69_opponent)
    .bind(event.team_score_at_trigger)
    .bind(event.sequence_number)
    .bind(event.r69w)
    .bind(final_margin)
    .bind(derived_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_analytics(conn: &mut SqliteConnection, a: &R69Analytics, derived_at: i64) -> Result<()> {
    let (pace, r69_pace) = match &a.r69 {
        Some(m) => (Some(m.pace_index), Some(m.r69_pace_index)),
        None => (None, None),
    };
    let (lead_duration, lead_status, lead_reason) = split(a.r69.as_ref().map(|m| &m.lead_duration_after_event));
    let (swing, swing_status, swing_reason) = split(a.r69.as_ref().map(|m| &m.swing_margin));
    let (comeback, comeback_status, comeback_reason) = split(a.r69.as_ref().map(|m| &m.comeback_after_loss));
    let unavailable_reason = lead_reason.or(swing_reason).or(comeback_reason);

    let flow = a.flow.as_ref();

    sqlx::query(
        r#"
        INSERT INTO r69_analytics (
            game_id, nice_score, double_nice, pace_index, r69_pace_index,
            lead_duration, lead_duration_status, swing_margin, swing_margin_status,
            comeback_69l, comeback_status, unavailable_reason,
            lead_changes, ties, biggest_lead, home_possessions, away_possessions, derived_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(game_id) DO UPDATE SET
            nice_score = excluded.nice_score,
            double_nice = excluded.double_nice,
            pace_index = excluded.pace_index,
            r69_pace_index = excluded.r69_pace_index,
            lead_duration = excluded.lead_duration,
            lead_duration_status = excluded.lead_duration_status,
            swing_margin = excluded.swing_margin,
            swing_margin_status = excluded.swing_margin_status,
            comeback_69l = excluded.comeback_69l,
            comeback_status = excluded.comeback_status,
            unavailable_reason = excluded.unavailable_reason,
            lead_changes = excluded.lead_changes,
            ties = excluded.ties,
            biggest_lead = excluded.biggest_lead,
            home_possessions = excluded.home_possessions,
            away_possessions = excluded.away_possessions,
            derived_at = excluded.derived_at
        "#,
    )
    .bind(&a.game_id)
    .bind(a.nice_score)
    .bind(a.double_nice)
    .bind(pace)
    .bind(r69_pace)
    .bind(lead_duration)
    .bind(lead_status)
    .bind(swing)
    .bind(swing_status)
    .bind(comeback)
    .bind(comeback_status)
    .bind(unavailable_reason)
    .bind(flow.map(|f| i64::from(f.lead_changes)))
    .bind(flow.map(|f| i64::from(f.ties)))
    .bind(flow.map(|f| f.biggest_lead.overall))
    .bind(flow.map(|f| i64::from(f.home_possessions)))
    .bind(flow.map(|f| i64::from(f.away_possessions)))
    .bind(derived_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// (value, status column, unavailable reason) for one derived column.
fn split<T: Clone>(derived: Option<&Derived<T>>) -> (Option<T>, Option<&'static str>, Option<String>) {
    match derived {
        None => (None, None, None),
        Some(Derived::Value(v)) => (Some(v.clone()), Some("value"), None),
        Some(Derived::Unavailable(reason)) => (None, Some("unavailable"), Some(reason.clone())),
    }
}
