//! Builders shared by the engine's unit tests.

use crate::types::{Game, GameStatus, League, PlayByPlayEvent};

pub const GAME_ID: &str = "g1";
pub const HOME: &str = "HOME";
pub const AWAY: &str = "AWAY";

pub fn final_game(home: i32, away: i32) -> Game {
    Game {
        id: GAME_ID.to_string(),
        league: League::Mens,
        season: "2024-25".to_string(),
        game_date: "2025-01-15".to_string(),
        home_team_id: HOME.to_string(),
        away_team_id: AWAY.to_string(),
        home_team_name: "Home U".to_string(),
        away_team_name: "Away State".to_string(),
        home_conference: Some("Big East".to_string()),
        away_conference: Some("ACC".to_string()),
        home_score: Some(home),
        away_score: Some(away),
        status: GameStatus::Final,
        total_periods: 2,
        overtime: false,
    }
}

pub fn live_game(home: i32, away: i32) -> Game {
    Game {
        status: GameStatus::InProgress,
        ..final_game(home, away)
    }
}

/// Administrative snapshot event with no team attribution.
pub fn event(seq: i64, period: u32, elapsed: i64, home: i32, away: i32) -> PlayByPlayEvent {
    PlayByPlayEvent {
        game_id: GAME_ID.to_string(),
        sequence_number: seq,
        period,
        elapsed_seconds: elapsed,
        team_id: None,
        event_type: "timeout".to_string(),
        points_scored: 0,
        home_score: home,
        away_score: away,
        description: None,
    }
}

/// Builds a scoring stream from `(elapsed, home, away)` snapshots.
///
/// The scoring team and points are inferred from the snapshot delta; the
/// period is 1 up to 1200s and 2 afterwards.
pub fn stream(snapshots: &[(i64, i32, i32)]) -> Vec<PlayByPlayEvent> {
    let mut prev = (0, 0);
    snapshots
        .iter()
        .enumerate()
        .map(|(i, &(elapsed, home, away))| {
            let (team_id, points) = if home != prev.0 {
                (Some(HOME.to_string()), home - prev.0)
            } else if away != prev.1 {
                (Some(AWAY.to_string()), away - prev.1)
            } else {
                (None, 0)
            };
            prev = (home, away);
            PlayByPlayEvent {
                game_id: GAME_ID.to_string(),
                sequence_number: i as i64 + 1,
                period: if elapsed <= 1_200 { 1 } else { 2 },
                elapsed_seconds: elapsed,
                team_id,
                event_type: if points > 0 { "shot_made".to_string() } else { "turnover".to_string() },
                points_scored: points.max(0),
                home_score: home,
                away_score: away,
                description: None,
            }
        })
        .collect()
}
