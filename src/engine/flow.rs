//! Whole-game flow statistics over the play-by-play stream.

use std::collections::HashSet;

use crate::config::{KEY_MOMENTS_LIMIT, KEY_MOMENT_R69_TOLERANCE_SECS};
use crate::types::{BiggestLead, Game, GameFlow, PlayByPlayEvent, R69Event, Side};

/// Number of times the lead passes from one team to the other.
/// Ties in between are not a leader, so home → tie → away is not counted.
pub fn lead_changes(events: &[PlayByPlayEvent]) -> u32 {
    let mut changes = 0;
    let mut previous: Option<Side> = None;

    for event in events {
        let current = event.leader();
        if let (Some(cur), Some(prev)) = (current, previous) {
            if cur != prev {
                changes += 1;
            }
        }
        previous = current;
    }
    changes
}

/// Number of times the score becomes level.
pub fn ties(events: &[PlayByPlayEvent]) -> u32 {
    let mut ties = 0;
    let mut previously_tied = false;

    for event in events {
        let tied = event.home_score == event.away_score;
        if tied && !previously_tied {
            ties += 1;
        }
        previously_tied = tied;
    }
    ties
}

pub fn biggest_lead(events: &[PlayByPlayEvent]) -> BiggestLead {
    let (home_max, away_max) = events.iter().fold((0, 0), |(home_max, away_max), e| {
        let margin = e.home_score - e.away_score;
        (home_max.max(margin), away_max.max(-margin))
    });
    BiggestLead {
        home_max,
        away_max,
        overall: home_max.max(away_max),
    }
}

/// Estimated possessions: shot and turnover events, optionally for one team.
pub fn possessions(events: &[PlayByPlayEvent], team_id: Option<&str>) -> u32 {
    events
        .iter()
        .filter(|e| e.event_type.contains("shot") || e.event_type.contains("turnover"))
        .filter(|e| team_id.map_or(true, |t| e.team_id.as_deref() == Some(t)))
        .count() as u32
}

/// Points per minute for `team_id` over the time covered by `events`.
pub fn scoring_pace(events: &[PlayByPlayEvent], team_id: &str) -> f64 {
    let Some(last) = events.last() else {
        return 0.0;
    };

    let total_points: i32 = events
        .iter()
        .filter(|e| e.team_id.as_deref() == Some(team_id) && e.points_scored > 0)
        .map(|e| e.points_scored)
        .sum();
    if total_points == 0 {
        return 0.0;
    }

    let elapsed = if last.elapsed_seconds > 0 { last.elapsed_seconds } else { 1 };
    round_to(total_points as f64 / elapsed as f64 * 60.0, 2)
}

/// Point differential for `team_id` over the trailing `window` events.
pub fn momentum(events: &[PlayByPlayEvent], team_id: &str, window: usize) -> i32 {
    if window == 0 || events.len() < window {
        return 0;
    }

    events[events.len() - window..].iter().fold(0, |acc, e| {
        if e.team_id.as_deref() == Some(team_id) {
            acc + e.points_scored
        } else {
            acc - e.points_scored
        }
    })
}

/// Notable plays: first score, lead changes, the R69 play and 3+ point plays.
/// Deduplicated, time-ordered, capped at [`KEY_MOMENTS_LIMIT`].
pub fn key_moments(events: &[PlayByPlayEvent], r69: Option<&R69Event>) -> Vec<PlayByPlayEvent> {
    let mut picks: Vec<&PlayByPlayEvent> = Vec::new();

    if let Some(first) = events.iter().find(|e| e.points_scored > 0) {
        picks.push(first);
    }

    let mut previous: Option<Side> = None;
    for event in events {
        let current = event.leader();
        if let (Some(cur), Some(prev)) = (current, previous) {
            if cur != prev {
                picks.push(event);
            }
        }
        previous = current;
    }

    if let Some(r69) = r69 {
        let play = events
            .iter()
            .find(|e| e.sequence_number == r69.sequence_number && e.elapsed_seconds == r69.t_to_69)
            .or_else(|| {
                events
                    .iter()
                    .find(|e| (e.elapsed_seconds - r69.t_to_69).abs() < KEY_MOMENT_R69_TOLERANCE_SECS)
            });
        if let Some(play) = play {
            picks.push(play);
        }
    }

    picks.extend(events.iter().filter(|e| e.points_scored >= 3));

    let mut seen = HashSet::new();
    let mut unique: Vec<PlayByPlayEvent> = picks
        .into_iter()
        .filter(|e| seen.insert(e.sequence_number))
        .cloned()
        .collect();
    unique.sort_by_key(|e| (e.elapsed_seconds, e.sequence_number));
    unique.truncate(KEY_MOMENTS_LIMIT);
    unique
}

pub fn game_flow(game: &Game, events: &[PlayByPlayEvent]) -> GameFlow {
    GameFlow {
        lead_changes: lead_changes(events),
        ties: ties(events),
        biggest_lead: biggest_lead(events),
        home_possessions: possessions(events, Some(&game.home_team_id)),
        away_possessions: possessions(events, Some(&game.away_team_id)),
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::detector::detect_r69_event;
    use crate::engine::test_support::{final_game, stream, AWAY, HOME};

    fn seesaw() -> Vec<PlayByPlayEvent> {
        stream(&[
            (30, 2, 0),   // home leads
            (60, 2, 2),   // tie
            (90, 2, 5),   // away leads (no change counted through tie)
            (120, 6, 5),  // home leads: change
            (150, 6, 8),  // away leads: change
            (180, 8, 8),  // tie
        ])
    }

    #[test]
    fn counts_lead_changes_skipping_ties() {
        assert_eq!(lead_changes(&seesaw()), 2);
    }

    #[test]
    fn counts_distinct_ties() {
        assert_eq!(ties(&seesaw()), 2);
        assert_eq!(ties(&[]), 0);
    }

    #[test]
    fn biggest_lead_tracks_both_sides() {
        let events = stream(&[(10, 10, 0), (20, 10, 12), (30, 30, 12)]);
        let lead = biggest_lead(&events);
        assert_eq!(lead.home_max, 18);
        assert_eq!(lead.away_max, 2);
        assert_eq!(lead.overall, 18);
    }

    #[test]
    fn possessions_count_shots_and_turnovers() {
        let mut events = seesaw();
        events[0].event_type = "rebound".to_string();
        assert_eq!(possessions(&events, None), 5);
        assert_eq!(possessions(&events, Some(AWAY)), 3);
    }

    #[test]
    fn scoring_pace_is_points_per_minute() {
        let events = stream(&[(60, 3, 0), (120, 3, 2), (180, 6, 2)]);
        assert_eq!(scoring_pace(&events, HOME), 2.0);
        assert_eq!(scoring_pace(&events, AWAY), 0.67);
        assert_eq!(scoring_pace(&[], HOME), 0.0);
    }

    #[test]
    fn momentum_over_trailing_window() {
        let events = stream(&[(10, 2, 0), (20, 2, 3), (30, 4, 3), (40, 7, 3)]);
        assert_eq!(momentum(&events, HOME, 3), 2);
        assert_eq!(momentum(&events, AWAY, 3), -2);
        assert_eq!(momentum(&events, HOME, 10), 0);
    }

    #[test]
    fn key_moments_include_r69_play_and_big_shots() {
        let game = final_game(72, 60);
        let events = stream(&[(10, 2, 0), (20, 2, 3), (30, 4, 3), (1300, 66, 60), (1310, 69, 60), (2000, 72, 60)]);
        let r69 = detect_r69_event(&game, &events).unwrap();
        let moments = key_moments(&events, r69.as_ref());
        let seqs: Vec<i64> = moments.iter().map(|e| e.sequence_number).collect();
        // first score, both lead changes, the R69 play and every 3+ point play.
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn key_moments_are_capped() {
        let snapshots: Vec<(i64, i32, i32)> = (1..=30i32).map(|i| (i64::from(i) * 10, i * 3, 0)).collect();
        assert_eq!(key_moments(&stream(&snapshots), None).len(), KEY_MOMENTS_LIMIT);
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_to(2.123456, 4), 2.1235);
        assert_eq!(round_to(0.666, 2), 0.67);
    }
}
