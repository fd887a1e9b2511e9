//! R69 derivation engine.
//!
//! Pure and synchronous: every function takes an already-fetched snapshot and
//! returns values. Nothing here touches the database or global state.

pub mod analytics;
pub mod detector;
pub mod flow;
pub mod outcome;
pub mod predictor;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

use serde::{Deserialize, Serialize};

pub use analytics::{compute_analytics, double_nice, nice_score};
pub use detector::{detect_r69_event, detect_r69_events};
pub use outcome::{resolve_r69_win, with_outcome};

use crate::error::EngineResult;
use crate::types::{GameSnapshot, R69Analytics, R69Event};

/// Everything the engine derives for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub game_id: String,
    /// Primary R69 event, with `r69w` resolved when the game is final.
    pub r69_event: Option<R69Event>,
    /// The other team's crossing, when both reached 69.
    pub secondary_event: Option<R69Event>,
    /// Only present for final games.
    pub analytics: Option<R69Analytics>,
}

/// Run detection, outcome resolution and analytics over one snapshot.
///
/// Live games get their R69 event (unresolved) and no analytics.
pub fn derive_game(snapshot: &GameSnapshot) -> EngineResult<Derivation> {
    let game = &snapshot.game;
    let events = &snapshot.events;

    let mut found = detect_r69_events(game, events)?.into_iter();
    let mut primary = found.next();
    let mut secondary = found.next();

    if !game.is_final() {
        return Ok(Derivation {
            game_id: game.id.clone(),
            r69_event: primary,
            secondary_event: secondary,
            analytics: None,
        });
    }

    if let Some(r69) = primary.as_mut() {
        r69.r69w = Some(resolve_r69_win(r69, game)?);
    }
    if let Some(r69) = secondary.as_mut() {
        r69.r69w = Some(resolve_r69_win(r69, game)?);
    }
    let analytics = compute_analytics(game, events, primary.as_ref())?;

    Ok(Derivation {
        game_id: game.id.clone(),
        r69_event: primary,
        secondary_event: secondary,
        analytics: Some(analytics),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{final_game, live_game, stream, HOME};
    use crate::types::Derived;

    #[test]
    fn final_game_is_fully_derived() {
        let snapshot = GameSnapshot {
            game: final_game(84, 79),
            events: stream(&[(1150, 67, 61), (1200, 69, 61), (2400, 84, 79)]),
        };
        let d = derive_game(&snapshot).unwrap();
        let r69 = d.r69_event.unwrap();
        assert_eq!(r69.team_id, HOME);
        assert_eq!(r69.r69w, Some(true));
        assert_eq!(d.secondary_event.as_ref().map(|e| e.r69w), Some(Some(false)));
        let metrics = d.analytics.unwrap().r69.unwrap();
        assert_eq!(metrics.swing_margin, Derived::Value(-3));
    }

    #[test]
    fn live_game_has_unresolved_event_and_no_analytics() {
        let snapshot = GameSnapshot {
            game: live_game(70, 50),
            events: stream(&[(1500, 69, 50), (1600, 70, 50)]),
        };
        let d = derive_game(&snapshot).unwrap();
        assert_eq!(d.r69_event.unwrap().r69w, None);
        assert!(d.analytics.is_none());
    }

    #[test]
    fn low_scoring_final_has_flags_only() {
        let snapshot = GameSnapshot {
            game: final_game(61, 58),
            events: stream(&[(1200, 30, 30), (2400, 61, 58)]),
        };
        let d = derive_game(&snapshot).unwrap();
        assert!(d.r69_event.is_none());
        let analytics = d.analytics.unwrap();
        assert!(analytics.r69.is_none());
        assert!(!analytics.nice_score);
        assert!(analytics.flow.is_some());
    }
}
