use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Mens,
    Womens,
}

impl std::fmt::Display for League {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            League::Mens => "mens",
            League::Womens => "womens",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for League {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mens" => Ok(League::Mens),
            "womens" => Ok(League::Womens),
            other => Err(format!("unknown league: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
    Postponed,
    Canceled,
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Final => "final",
            GameStatus::Postponed => "postponed",
            GameStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Ok(GameStatus::Scheduled),
            "in_progress" => Ok(GameStatus::InProgress),
            "final" => Ok(GameStatus::Final),
            "postponed" => Ok(GameStatus::Postponed),
            "canceled" => Ok(GameStatus::Canceled),
            other => Err(format!("unknown game status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Home => write!(f, "home"),
            Side::Away => write!(f, "away"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Apply this order to an ascending comparison.
    pub fn apply(self, ord: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub league: League,
    pub season: String,
    /// ISO date (YYYY-MM-DD); chronological ordering key.
    pub game_date: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_team_name: String,
    pub away_team_name: String,
    #[serde(default)]
    pub home_conference: Option<String>,
    #[serde(default)]
    pub away_conference: Option<String>,
    /// Null until the game has a score.
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub status: GameStatus,
    pub total_periods: u32,
    pub overtime: bool,
}

impl Game {
    pub fn is_final(&self) -> bool {
        self.status == GameStatus::Final
    }

    /// Which side the team plays on, None if it is not in this game.
    pub fn side_of(&self, team_id: &str) -> Option<Side> {
        if team_id == self.home_team_id {
            Some(Side::Home)
        } else if team_id == self.away_team_id {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn team_id(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team_id,
            Side::Away => &self.away_team_id,
        }
    }

    pub fn team_name(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team_name,
            Side::Away => &self.away_team_name,
        }
    }

    /// (home, away) final scores when both are known.
    pub fn final_scores(&self) -> Option<(i32, i32)> {
        Some((self.home_score?, self.away_score?))
    }

    /// Final margin from `side`'s perspective.
    pub fn final_margin(&self, side: Side) -> Option<i32> {
        let (home, away) = self.final_scores()?;
        Some(match side {
            Side::Home => home - away,
            Side::Away => away - home,
        })
    }
}

// ---------------------------------------------------------------------------
// Play-by-play
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayByPlayEvent {
    pub game_id: String,
    pub sequence_number: i64,
    pub period: u32,
    /// Seconds since tip-off.
    pub elapsed_seconds: i64,
    /// None for administrative events (timeouts, period ends).
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub points_scored: i32,
    /// Cumulative scores after this event is applied.
    pub home_score: i32,
    pub away_score: i32,
    #[serde(default)]
    pub description: Option<String>,
}

impl PlayByPlayEvent {
    pub fn score(&self, side: Side) -> i32 {
        match side {
            Side::Home => self.home_score,
            Side::Away => self.away_score,
        }
    }

    /// True when `side` strictly leads in this snapshot.
    pub fn is_leading(&self, side: Side) -> bool {
        self.score(side) > self.score(side.opponent())
    }

    pub fn leader(&self) -> Option<Side> {
        match self.home_score.cmp(&self.away_score) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// An immutable (game, ordered events) pair as fetched from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game: Game,
    #[serde(default)]
    pub events: Vec<PlayByPlayEvent>,
}

// ---------------------------------------------------------------------------
// Derived records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R69Event {
    pub game_id: String,
    pub team_id: String,
    pub side: Side,
    /// Elapsed seconds of the event that carried the team to 69.
    pub t_to_69: i64,
    pub period_at_69: u32,
    /// 69 minus the opponent's score at that moment; negative if the opponent was past 69.
    pub margin_at_69: i32,
    /// Always 69.
    pub score_at_69_team: i32,
    pub score_at_69_opponent: i32,
    /// Raw snapshot score on the triggering event (70 or 71 when a basket jumps past 69).
    pub team_score_at_trigger: i32,
    pub sequence_number: i64,
    /// Whether the team went on to win. None until the game is final.
    pub r69w: Option<bool>,
}

/// A derived value that is either computed or explicitly unavailable.
///
/// Unavailable is not the same as zero: it means the inputs could not support
/// the computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Derived<T> {
    Value(T),
    Unavailable(String),
}

impl<T: Clone> Derived<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Derived::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Derived::Value(_))
    }

    pub fn as_option(&self) -> Option<T> {
        match self {
            Derived::Value(v) => Some(v.clone()),
            Derived::Unavailable(_) => None,
        }
    }

    /// Surface the value, turning unavailability into an engine error.
    pub fn value(&self, field: &'static str) -> EngineResult<T> {
        match self {
            Derived::Value(v) => Ok(v.clone()),
            Derived::Unavailable(reason) => Err(EngineError::Unavailable {
                field,
                reason: reason.clone(),
            }),
        }
    }
}

/// Metrics that only exist when the game has an R69 event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R69Metrics {
    pub pace_index: f64,
    pub r69_pace_index: f64,
    /// Seconds the R69 team led after reaching 69.
    pub lead_duration_after_event: Derived<i64>,
    pub swing_margin: Derived<i32>,
    pub comeback_after_loss: Derived<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiggestLead {
    pub home_max: i32,
    pub away_max: i32,
    pub overall: i32,
}

/// Whole-game flow statistics from the play-by-play stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFlow {
    pub lead_changes: u32,
    pub ties: u32,
    pub biggest_lead: BiggestLead,
    pub home_possessions: u32,
    pub away_possessions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R69Analytics {
    pub game_id: String,
    /// Either final score is exactly 69.
    pub nice_score: bool,
    /// Both teams finished at 69 or above.
    pub double_nice: bool,
    pub r69: Option<R69Metrics>,
    pub flow: Option<GameFlow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_serializes_with_status_tag() {
        let v: Derived<i32> = Derived::Value(-3);
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            serde_json::json!({"status": "value", "data": -3})
        );
        let u: Derived<i32> = Derived::unavailable("no events");
        assert_eq!(
            serde_json::to_value(&u).unwrap(),
            serde_json::json!({"status": "unavailable", "data": "no events"})
        );
    }

    #[test]
    fn derived_value_maps_unavailable_to_engine_error() {
        let u: Derived<bool> = Derived::unavailable("no events");
        let err = u.value("comeback_after_loss").unwrap_err();
        assert_eq!(err.kind(), "unavailable");
        assert!(!u.is_available());
        assert_eq!(Derived::Value(5i64).value("x"), Ok(5));
    }

    #[test]
    fn status_and_league_round_trip_through_strings() {
        for status in [
            GameStatus::Scheduled,
            GameStatus::InProgress,
            GameStatus::Final,
            GameStatus::Postponed,
            GameStatus::Canceled,
        ] {
            assert_eq!(status.to_string().parse::<GameStatus>(), Ok(status));
        }
        assert_eq!("WOMENS".parse::<League>(), Ok(League::Womens));
        assert!("coed".parse::<League>().is_err());
    }

    #[test]
    fn leader_follows_snapshot() {
        let mut e = PlayByPlayEvent {
            game_id: "g".to_string(),
            sequence_number: 1,
            period: 1,
            elapsed_seconds: 10,
            team_id: None,
            event_type: String::new(),
            points_scored: 0,
            home_score: 2,
            away_score: 0,
            description: None,
        };
        assert_eq!(e.leader(), Some(Side::Home));
        assert!(e.is_leading(Side::Home));
        e.away_score = 2;
        assert_eq!(e.leader(), None);
        assert!(!e.is_leading(Side::Away));
    }
}
