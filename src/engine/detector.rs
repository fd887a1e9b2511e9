use tracing::debug;

use crate::config::R69_TARGET;
use crate::engine::validate::validate_events;
use crate::error::EngineResult;
use crate::types::{Game, PlayByPlayEvent, R69Event, Side};

/// Find the primary R69 event: the first team, in scan order, whose
/// cumulative score reaches 69.
pub fn detect_r69_event(game: &Game, events: &[PlayByPlayEvent]) -> EngineResult<Option<R69Event>> {
    Ok(detect_r69_events(game, events)?.into_iter().next())
}

/// Every team's first crossing of 69, primary first. At most one per team.
///
/// The second entry only shows up when both teams reach 69; callers that
/// want the canonical record should take the first.
pub fn detect_r69_events(game: &Game, events: &[PlayByPlayEvent]) -> EngineResult<Vec<R69Event>> {
    validate_events(game, events)?;

    let mut found: Vec<R69Event> = Vec::with_capacity(2);
    let mut reached_home = false;
    let mut reached_away = false;

    for event in events {
        for side in crossing_order(game, event) {
            let reached = match side {
                Side::Home => &mut reached_home,
                Side::Away => &mut reached_away,
            };
            // A crossing is final; later snapshots dipping below 69 are ignored.
            if *reached || event.score(side) < R69_TARGET {
                continue;
            }
            *reached = true;

            let r69 = build_event(game, event, side);
            debug!(
                game_id = %game.id,
                team_id = %r69.team_id,
                t_to_69 = r69.t_to_69,
                margin_at_69 = r69.margin_at_69,
                primary = found.is_empty(),
                "R69 crossing"
            );
            found.push(r69);
        }

        if reached_home && reached_away {
            break;
        }
    }

    Ok(found)
}

/// Order in which the two sides are checked on a single event.
///
/// A snapshot can in principle move both totals at once; the attributed team
/// is checked first, then home before away.
fn crossing_order(game: &Game, event: &PlayByPlayEvent) -> [Side; 2] {
    match event.team_id.as_deref().and_then(|t| game.side_of(t)) {
        Some(Side::Away) => [Side::Away, Side::Home],
        _ => [Side::Home, Side::Away],
    }
}

fn build_event(game: &Game, event: &PlayByPlayEvent, side: Side) -> R69Event {
    let opponent_score = event.score(side.opponent());
    R69Event {
        game_id: game.id.clone(),
        team_id: game.team_id(side).to_string(),
        side,
        t_to_69: event.elapsed_seconds,
        period_at_69: event.period,
        margin_at_69: R69_TARGET - opponent_score,
        score_at_69_team: R69_TARGET,
        score_at_69_opponent: opponent_score,
        team_score_at_trigger: event.score(side),
        sequence_number: event.sequence_number,
        r69w: None,
    }
}
