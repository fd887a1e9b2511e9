use tracing::debug;

use crate::config::{
    regulation_periods, AVG_T_TO_69_SECS, OVERTIME_SECONDS, PACE_NORMALIZATION_MINUTES, R69_TARGET,
    REGULATION_SECONDS,
};
use crate::engine::flow::{game_flow, round_to};
use crate::engine::outcome::{check_r69_event, resolve_r69_win};
use crate::engine::validate::validate_events;
use crate::error::{EngineError, EngineResult};
use crate::types::{Derived, Game, PlayByPlayEvent, R69Analytics, R69Event, R69Metrics, Side};

const NO_EVENTS: &str = "no play-by-play events for game";

/// Derive the analytics record for a final game.
///
/// Without an R69 event only the nice-score flags (and flow stats, when there
/// are events) are filled in. Event-dependent R69 metrics are `Unavailable`
/// rather than zero when the play-by-play stream is empty.
pub fn compute_analytics(
    game: &Game,
    events: &[PlayByPlayEvent],
    r69: Option<&R69Event>,
) -> EngineResult<R69Analytics> {
    if !game.is_final() {
        return Err(EngineError::invalid_state(
            &game.id,
            format!("analytics requested while game is {}", game.status),
        ));
    }
    let (home, away) = game
        .final_scores()
        .ok_or_else(|| EngineError::data_integrity(&game.id, "final game is missing a final score"))?;
    validate_events(game, events)?;

    let mut analytics = R69Analytics {
        game_id: game.id.clone(),
        nice_score: nice_score(home, away),
        double_nice: double_nice(home, away),
        r69: None,
        flow: (!events.is_empty()).then(|| game_flow(game, events)),
    };

    let Some(r69) = r69 else {
        return Ok(analytics);
    };

    let side = check_r69_event(r69, game)?;
    let won = resolve_r69_win(r69, game)?;
    if let Some(recorded) = r69.r69w {
        if recorded != won {
            return Err(EngineError::data_integrity(
                &game.id,
                format!("R69 event records r69w={recorded} but final score says {won}"),
            ));
        }
    }

    let elapsed = events
        .last()
        .map(|e| e.elapsed_seconds)
        .unwrap_or_else(|| expected_game_seconds(game));

    let metrics = if events.is_empty() {
        R69Metrics {
            pace_index: pace_index(home + away, elapsed),
            r69_pace_index: r69_pace_index(r69.t_to_69),
            lead_duration_after_event: Derived::unavailable(NO_EVENTS),
            swing_margin: Derived::unavailable(NO_EVENTS),
            comeback_after_loss: Derived::unavailable(NO_EVENTS),
        }
    } else {
        let trigger = trigger_index(game, events, r69, side)?;
        let final_margin = home_away_margin(home, away, side);
        R69Metrics {
            pace_index: pace_index(home + away, elapsed),
            r69_pace_index: r69_pace_index(r69.t_to_69),
            lead_duration_after_event: Derived::Value(lead_duration_after(events, trigger, side)),
            swing_margin: Derived::Value(swing_margin(r69.margin_at_69, final_margin, won)),
            comeback_after_loss: Derived::Value(comeback_after_loss(events, trigger, side, won)),
        }
    };

    debug!(
        game_id = %game.id,
        r69_team = %r69.team_id,
        r69w = won,
        pace_index = metrics.pace_index,
        "analytics computed"
    );
    analytics.r69 = Some(metrics);
    Ok(analytics)
}

/// Either final score is exactly 69.
pub fn nice_score(home: i32, away: i32) -> bool {
    home == R69_TARGET || away == R69_TARGET
}

/// Both teams finished at or above 69.
pub fn double_nice(home: i32, away: i32) -> bool {
    home >= R69_TARGET && away >= R69_TARGET
}

/// Points per 40 minutes, rounded to 4 decimals. 0 when no time has elapsed.
pub fn pace_index(total_points: i32, elapsed_seconds: i64) -> f64 {
    if elapsed_seconds <= 0 {
        return 0.0;
    }
    let per_second = total_points as f64 / elapsed_seconds as f64;
    round_to(per_second * PACE_NORMALIZATION_MINUTES * 60.0, 4)
}

/// How fast the team reached 69 relative to the league average (>1 is faster).
pub fn r69_pace_index(t_to_69: i64) -> f64 {
    if t_to_69 <= 0 {
        return 0.0;
    }
    round_to(AVG_T_TO_69_SECS / t_to_69 as f64, 4)
}

/// Regulation plus overtime length, used when a game has no events.
pub fn expected_game_seconds(game: &Game) -> i64 {
    let mut overtime_periods = game.total_periods.saturating_sub(regulation_periods(game.league));
    if game.overtime && overtime_periods == 0 {
        overtime_periods = 1;
    }
    REGULATION_SECONDS + OVERTIME_SECONDS * i64::from(overtime_periods)
}

/// Seconds the R69 team strictly led after the trigger.
///
/// Each interval ends on an event; it counts when the team leads in that
/// event's snapshot. The first interval starts at the trigger time.
pub fn lead_duration_after(events: &[PlayByPlayEvent], trigger: usize, side: Side) -> i64 {
    let Some(start) = events.get(trigger) else {
        return 0;
    };
    let mut last_time = start.elapsed_seconds;
    let mut lead_seconds = 0;

    for event in &events[trigger + 1..] {
        if event.is_leading(side) {
            lead_seconds += event.elapsed_seconds - last_time;
        }
        last_time = event.elapsed_seconds;
    }
    lead_seconds
}

/// Margin movement after reaching 69, from the R69 team's point of view.
///
/// The branches are asymmetric: a win measures
/// `final - at69`, a loss measures `-(final + at69)`.
pub fn swing_margin(margin_at_69: i32, final_margin: i32, r69_team_won: bool) -> i32 {
    if r69_team_won {
        final_margin - margin_at_69
    } else {
        -(final_margin + margin_at_69)
    }
}

/// True when the R69 team lost, but after the trigger it dropped out of the
/// lead and later led again.
pub fn comeback_after_loss(events: &[PlayByPlayEvent], trigger: usize, side: Side, r69_team_won: bool) -> bool {
    if r69_team_won || trigger >= events.len() {
        return false;
    }

    let mut lost_lead = false;
    for event in &events[trigger + 1..] {
        let leading = event.is_leading(side);
        if !leading {
            lost_lead = true;
        } else if lost_lead {
            return true;
        }
    }
    false
}

fn home_away_margin(home: i32, away: i32, side: Side) -> i32 {
    match side {
        Side::Home => home - away,
        Side::Away => away - home,
    }
}

/// Position of the triggering event. It must exist and carry the crossing.
fn trigger_index(game: &Game, events: &[PlayByPlayEvent], r69: &R69Event, side: Side) -> EngineResult<usize> {
    events
        .iter()
        .position(|e| {
            e.sequence_number == r69.sequence_number
                && e.elapsed_seconds == r69.t_to_69
                && e.score(side) >= R69_TARGET
        })
        .ok_or_else(|| {
            EngineError::data_integrity(
                &game.id,
                format!(
                    "no event at elapsed {} (seq {}) takes {} to 69",
                    r69.t_to_69, r69.sequence_number, r69.team_id
                ),
            )
        })
}
