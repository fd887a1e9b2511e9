use crate::config::R69_TARGET;
use crate::error::{EngineError, EngineResult};
use crate::types::{Game, R69Event, Side};

/// Decide whether the R69 team won. Only defined once the game is final.
pub fn resolve_r69_win(r69: &R69Event, game: &Game) -> EngineResult<bool> {
    let side = check_r69_event(r69, game)?;

    if !game.is_final() {
        return Err(EngineError::invalid_state(
            &game.id,
            format!("R69 outcome requested while game is {}", game.status),
        ));
    }

    let margin = game
        .final_margin(side)
        .ok_or_else(|| EngineError::data_integrity(&game.id, "final game is missing a final score"))?;

    if margin == 0 {
        return Err(EngineError::data_integrity(&game.id, "final score is tied"));
    }
    Ok(margin > 0)
}

/// Return a copy of `r69` with `r69w` filled in.
pub fn with_outcome(r69: &R69Event, game: &Game) -> EngineResult<R69Event> {
    let r69w = resolve_r69_win(r69, game)?;
    Ok(R69Event {
        r69w: Some(r69w),
        ..r69.clone()
    })
}

/// Consistency checks shared by every operation that consumes an R69 event.
/// Returns the side the R69 team plays on.
pub(crate) fn check_r69_event(r69: &R69Event, game: &Game) -> EngineResult<Side> {
    if r69.game_id != game.id {
        return Err(EngineError::data_integrity(
            &game.id,
            format!("R69 event belongs to game {}", r69.game_id),
        ));
    }
    if r69.score_at_69_team != R69_TARGET {
        return Err(EngineError::data_integrity(
            &game.id,
            format!("R69 event records score-at-69 of {}", r69.score_at_69_team),
        ));
    }
    let side = game.side_of(&r69.team_id).ok_or_else(|| {
        EngineError::data_integrity(&game.id, format!("R69 team {} is not playing in this game", r69.team_id))
    })?;
    if side != r69.side {
        return Err(EngineError::data_integrity(
            &game.id,
            format!("R69 team {} is recorded as {} but plays {}", r69.team_id, r69.side, side),
        ));
    }
    Ok(side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::detector::detect_r69_event;
    use crate::engine::test_support::{final_game, live_game, stream, AWAY};
    use crate::types::GameStatus;

    fn home_r69(game: &crate::types::Game) -> R69Event {
        let events = stream(&[(1200, 69, 61)]);
        detect_r69_event(game, &events).unwrap().unwrap()
    }

    #[test]
    fn winner_resolves_true() {
        let game = final_game(84, 79);
        assert_eq!(resolve_r69_win(&home_r69(&game), &game), Ok(true));
    }

    #[test]
    fn loser_resolves_false() {
        let game = final_game(77, 80);
        assert_eq!(resolve_r69_win(&home_r69(&game), &game), Ok(false));
    }

    #[test]
    fn non_final_game_is_invalid_state() {
        for status in [
            GameStatus::Scheduled,
            GameStatus::InProgress,
            GameStatus::Postponed,
            GameStatus::Canceled,
        ] {
            let mut game = live_game(84, 79);
            game.status = status;
            let err = resolve_r69_win(&home_r69(&game), &game).unwrap_err();
            assert_eq!(err.kind(), "invalid_state", "status {status}");
        }
    }

    #[test]
    fn tied_final_is_data_integrity() {
        let game = final_game(75, 75);
        let err = resolve_r69_win(&home_r69(&game), &game).unwrap_err();
        assert_eq!(err.kind(), "data_integrity");
    }

    #[test]
    fn missing_final_score_is_data_integrity() {
        let mut game = final_game(75, 70);
        game.away_score = None;
        let err = resolve_r69_win(&home_r69(&game), &game).unwrap_err();
        assert_eq!(err.kind(), "data_integrity");
    }

    #[test]
    fn score_at_69_other_than_69_is_rejected() {
        let game = final_game(84, 79);
        let mut r69 = home_r69(&game);
        r69.score_at_69_team = 70;
        assert_eq!(resolve_r69_win(&r69, &game).unwrap_err().kind(), "data_integrity");
    }

    #[test]
    fn unknown_team_is_rejected() {
        let game = final_game(84, 79);
        let mut r69 = home_r69(&game);
        r69.team_id = "NOBODY".to_string();
        assert!(resolve_r69_win(&r69, &game).is_err());
    }

    #[test]
    fn with_outcome_fills_r69w() {
        let game = final_game(60, 71);
        let mut r69 = home_r69(&game);
        r69.team_id = AWAY.to_string();
        r69.side = crate::types::Side::Away;
        let resolved = with_outcome(&r69, &game).unwrap();
        assert_eq!(resolved.r69w, Some(true));
    }
}
