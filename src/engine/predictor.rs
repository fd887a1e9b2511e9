//! Live-game R69 projections.
//!
//! These are heuristics for games still in progress. They do not feed the
//! persisted R69 records.

use serde::{Deserialize, Serialize};

use crate::config::{AVG_T_TO_69_SECS, HISTORICAL_R69W_RATE, R69_TARGET, REGULATION_SECONDS};
use crate::engine::flow::scoring_pace;
use crate::types::{Game, PlayByPlayEvent};

/// Estimated race to 69 between a team and its opponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct R69RaceEstimate {
    pub team_prob: i32,
    pub opponent_prob: i32,
    /// Seconds until the team reaches 69 at its current pace; None if it is not scoring.
    pub team_time_estimate: Option<i64>,
    pub opponent_time_estimate: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R69Prediction {
    pub game_id: String,
    pub home_prob: i32,
    pub away_prob: i32,
    pub home_pace: f64,
    pub away_pace: f64,
    pub home_time_estimate: Option<i64>,
    pub away_time_estimate: Option<i64>,
    /// 0..=100
    pub confidence: i32,
}

/// Win probability (percent) from the current margin and clock.
pub fn win_probability(score: i32, opponent_score: i32, time_remaining: i64, total_game_time: i64) -> f64 {
    let margin = (score - opponent_score) as f64;
    let remaining_pct = if total_game_time > 0 {
        time_remaining as f64 / total_game_time as f64
    } else {
        0.0
    };

    let logit = margin * 3.5 + (1.0 - remaining_pct) * 20.0 - 10.0;
    let probability = 1.0 / (1.0 + (-logit).exp());
    (probability * 100.0).clamp(0.0, 100.0)
}

/// Which side is on course to reach 69 first, given each side's points per minute.
pub fn r69_race_probability(score: i32, opponent_score: i32, pace: f64, opponent_pace: f64) -> R69RaceEstimate {
    let team_time = time_to_target(score, pace);
    let opponent_time = time_to_target(opponent_score, opponent_pace);

    let team_prob = match (team_time, opponent_time) {
        (Some(t), Some(o)) => 100.0 / (1.0 + (-(o - t) / 60.0).exp()),
        (Some(_), None) => 100.0,
        (None, Some(_)) => 0.0,
        (None, None) => 50.0,
    };

    R69RaceEstimate {
        team_prob: team_prob.round() as i32,
        opponent_prob: (100.0 - team_prob).round() as i32,
        team_time_estimate: team_time.map(|t| t.round() as i64),
        opponent_time_estimate: opponent_time.map(|t| t.round() as i64),
    }
}

fn time_to_target(score: i32, pace: f64) -> Option<f64> {
    if pace <= 0.0 {
        return None;
    }
    let needed = (R69_TARGET - score).max(0) as f64;
    Some(needed / pace * 60.0)
}

/// How steady the home scoring pace has been (0..=100).
///
/// Splits the stream into five windows and penalizes the coefficient of
/// variation of the per-window pace.
pub fn pace_confidence(events: &[PlayByPlayEvent], game: &Game) -> f64 {
    if events.len() < 10 {
        return 10.0;
    }

    let window = events.len() / 5;
    let paces: Vec<f64> = (0..events.len() - window)
        .step_by(window)
        .map(|start| scoring_pace(&events[start..start + window], &game.home_team_id))
        .collect();
    if paces.len() < 2 {
        return 50.0;
    }

    let n = paces.len() as f64;
    let mean = paces.iter().sum::<f64>() / n;
    let variance = paces.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let cv = if mean > 0.0 { variance.sqrt() / mean * 100.0 } else { 100.0 };

    (100.0 - cv * 2.0).max(0.0)
}

/// Live R69 projection for an in-progress game.
pub fn generate_r69_prediction(game: &Game, events: &[PlayByPlayEvent]) -> R69Prediction {
    let current_time = events.last().map_or(0, |e| e.elapsed_seconds);
    let (home_score, away_score) = events
        .last()
        .map(|e| (e.home_score, e.away_score))
        .unwrap_or((game.home_score.unwrap_or(0), game.away_score.unwrap_or(0)));

    let home_pace = scoring_pace(events, &game.home_team_id);
    let away_pace = scoring_pace(events, &game.away_team_id);
    let race = r69_race_probability(home_score, away_score, home_pace, away_pace);

    let elapsed_pct = current_time as f64 / REGULATION_SECONDS as f64;
    let confidence = (elapsed_pct * 50.0 + pace_confidence(events, game) / 100.0 * 50.0).min(100.0);

    R69Prediction {
        game_id: game.id.clone(),
        home_prob: race.team_prob,
        away_prob: race.opponent_prob,
        home_pace,
        away_pace,
        home_time_estimate: race.team_time_estimate,
        away_time_estimate: race.opponent_time_estimate,
        confidence: confidence.round() as i32,
    }
}

/// Final score if the current pace holds.
pub fn predict_final_score(score: i32, current_time: i64, pace: f64, total_game_time: i64) -> i32 {
    let minutes_remaining = (total_game_time - current_time) as f64 / 60.0;
    (score as f64 + pace * minutes_remaining).round() as i32
}

/// Elapsed seconds at which the team should reach 69. None when it is not scoring.
pub fn expected_r69_time(score: i32, current_time: i64, pace: f64) -> Option<f64> {
    if score >= R69_TARGET {
        return Some(current_time as f64);
    }
    if pace <= 0.0 {
        return None;
    }
    let needed = (R69_TARGET - score) as f64;
    Some(current_time as f64 + needed / pace * 60.0)
}

/// Chance (percent) that the R69 team goes on to win, from historical rates.
pub fn historical_r69w_probability(margin_at_69: i32, period_at_69: u32, t_to_69: i64) -> f64 {
    let mut prob = HISTORICAL_R69W_RATE;

    if margin_at_69 >= 15 {
        prob += 15.0;
    } else if margin_at_69 >= 10 {
        prob += 10.0;
    } else if margin_at_69 >= 5 {
        prob += 5.0;
    } else if margin_at_69 < 3 {
        prob -= 10.0;
    }

    if period_at_69 == 1 {
        prob -= 5.0;
    } else if period_at_69 >= 3 {
        prob += 5.0;
    }

    let t = t_to_69 as f64;
    if t < AVG_T_TO_69_SECS * 0.7 {
        prob += 5.0;
    } else if t > AVG_T_TO_69_SECS * 1.3 {
        prob -= 5.0;
    }

    prob.clamp(0.0, 100.0)
}
