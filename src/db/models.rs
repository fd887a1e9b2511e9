//! Row types for the tables in `migrations/`, and their conversions into
//! engine types. Bad enum text in a row is reported as `CorruptRow`.

use crate::error::{AppError, Result};
use crate::types::{Derived, Game, GameStatus, League, PlayByPlayEvent, R69Event, Side};

#[derive(Debug, sqlx::FromRow)]
pub struct GameRow {
    pub id: String,
    pub league: String,
    pub season: String,
    pub game_date: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_conference: Option<String>,
    pub away_conference: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub status: String,
    pub total_periods: i64,
    pub overtime: bool,
}

impl TryFrom<GameRow> for Game {
    type Error = AppError;

    fn try_from(row: GameRow) -> Result<Self> {
        let league = row.league.parse::<League>().map_err(|e| corrupt("games", e))?;
        let status = row.status.parse::<GameStatus>().map_err(|e| corrupt("games", e))?;
        Ok(Game {
            id: row.id,
            league,
            season: row.season,
            game_date: row.game_date,
            home_team_id: row.home_team_id,
            away_team_id: row.away_team_id,
            home_team_name: row.home_team_name,
            away_team_name: row.away_team_name,
            home_conference: row.home_conference,
            away_conference: row.away_conference,
            home_score: row.home_score.map(|s| narrow("games", "home_score", s)).transpose()?,
            away_score: row.away_score.map(|s| narrow("games", "away_score", s)).transpose()?,
            status,
            total_periods: row.total_periods.max(0) as u32,
            overtime: row.overtime,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PbpEventRow {
    pub game_id: String,
    pub sequence_number: i64,
    pub period: i64,
    pub elapsed_seconds: i64,
    pub team_id: Option<String>,
    pub event_type: String,
    pub points_scored: i64,
    pub home_score: i64,
    pub away_score: i64,
    pub description: Option<String>,
}

impl TryFrom<PbpEventRow> for PlayByPlayEvent {
    type Error = AppError;

    fn try_from(row: PbpEventRow) -> Result<Self> {
        Ok(PlayByPlayEvent {
            game_id: row.game_id,
            sequence_number: row.sequence_number,
            period: row.period.max(0) as u32,
            elapsed_seconds: row.elapsed_seconds,
            team_id: row.team_id,
            event_type: row.event_type,
            points_scored: narrow("pbp_events", "points_scored", row.points_scored)?,
            home_score: narrow("pbp_events", "home_score", row.home_score)?,
            away_score: narrow("pbp_events", "away_score", row.away_score)?,
            description: row.description,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct R69EventRow {
    pub game_id: String,
    pub team_id: String,
    pub side: String,
    pub is_primary: bool,
    pub t_to_69: i64,
    pub period_at_69: i64,
    pub margin_at_69: i64,
    pub score_at_69_team: i64,
    pub score_at_69_opponent: i64,
    pub team_score_at_trigger: i64,
    pub sequence_number: i64,
    pub r69w: Option<bool>,
}

impl TryFrom<R69EventRow> for R69Event {
    type Error = AppError;

    fn try_from(row: R69EventRow) -> Result<Self> {
        let side = match row.side.as_str() {
            "home" => Side::Home,
            "away" => Side::Away,
            other => return Err(corrupt("r69_events", format!("unknown side: {other}"))),
        };
        Ok(R69Event {
            game_id: row.game_id,
            team_id: row.team_id,
            side,
            t_to_69: row.t_to_69,
            period_at_69: row.period_at_69.max(0) as u32,
            margin_at_69: narrow("r69_events", "margin_at_69", row.margin_at_69)?,
            score_at_69_team: narrow("r69_events", "score_at_69_team", row.score_at_69_team)?,
            score_at_69_opponent: narrow("r69_events", "score_at_69_opponent", row.score_at_69_opponent)?,
            team_score_at_trigger: narrow("r69_events", "team_score_at_trigger", row.team_score_at_trigger)?,
            sequence_number: row.sequence_number,
            r69w: row.r69w,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AnalyticsRow {
    pub game_id: String,
    pub nice_score: bool,
    pub double_nice: bool,
    pub pace_index: Option<f64>,
    pub r69_pace_index: Option<f64>,
    pub lead_duration: Option<i64>,
    pub lead_duration_status: Option<String>,
    pub swing_margin: Option<i64>,
    pub swing_margin_status: Option<String>,
    pub comeback_69l: Option<bool>,
    pub comeback_status: Option<String>,
    pub unavailable_reason: Option<String>,
    pub derived_at: i64,
}

impl AnalyticsRow {
    pub fn lead_duration(&self) -> Option<Derived<i64>> {
        self.derived(self.lead_duration_status.as_deref(), self.lead_duration)
    }

    pub fn swing_margin(&self) -> Option<Derived<i32>> {
        self.derived(self.swing_margin_status.as_deref(), self.swing_margin.and_then(|v| i32::try_from(v).ok()))
    }

    pub fn comeback_after_loss(&self) -> Option<Derived<bool>> {
        self.derived(self.comeback_status.as_deref(), self.comeback_69l)
    }

    /// None when the game had no R69 event (status column NULL).
    fn derived<T: Clone>(&self, status: Option<&str>, value: Option<T>) -> Option<Derived<T>> {
        match (status?, value) {
            ("value", Some(v)) => Some(Derived::Value(v)),
            _ => Some(Derived::unavailable(self.unavailable_reason.clone().unwrap_or_default())),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TeamStatsRow {
    pub team_id: String,
    pub season: String,
    pub team_name: String,
    pub conference: Option<String>,
    pub league: String,
    pub games_played: i64,
    pub r69_wins: i64,
    pub r69_losses: i64,
    pub r69_win_pct: f64,
    pub avg_t_to_69: f64,
    pub avg_margin_at_69: f64,
    pub updated_at: i64,
}

/// SQLite integers are i64; scores and margins must fit an i32.
fn narrow(table: &'static str, field: &str, value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| corrupt(table, format!("{field} out of range: {value}")))
}

fn corrupt(table: &'static str, detail: impl Into<String>) -> AppError {
    AppError::CorruptRow {
        table,
        detail: detail.into(),
    }
}
