use serde::{Deserialize, Serialize};

use crate::config::R69_TARGET;
use crate::engine::{double_nice, nice_score};
use crate::types::{Game, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NiceType {
    /// A team finished on exactly 69.
    Single,
    /// Both teams finished on 69 or more.
    Double,
}

/// A final game worth listing for its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NiceGame {
    pub game: Game,
    pub nice_type: NiceType,
    /// Names of the teams that finished on exactly 69.
    pub nice_teams: Vec<String>,
}

impl NiceGame {
    /// None unless the game is final with a nice or double-nice score.
    pub fn classify(game: &Game) -> Option<NiceGame> {
        if !game.is_final() {
            return None;
        }
        let (home, away) = game.final_scores()?;
        let double = double_nice(home, away);
        if !nice_score(home, away) && !double {
            return None;
        }

        let nice_teams = [(Side::Home, home), (Side::Away, away)]
            .into_iter()
            .filter(|&(_, score)| score == R69_TARGET)
            .map(|(side, _)| game.team_name(side).to_string())
            .collect();

        Some(NiceGame {
            game: game.clone(),
            nice_type: if double { NiceType::Double } else { NiceType::Single },
            nice_teams,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{final_game, live_game};

    #[test]
    fn single_nice_names_the_69_team() {
        let nice = NiceGame::classify(&final_game(69, 64)).unwrap();
        assert_eq!(nice.nice_type, NiceType::Single);
        assert_eq!(nice.nice_teams, vec!["Home U".to_string()]);
    }

    #[test]
    fn double_nice_without_an_exact_69() {
        let nice = NiceGame::classify(&final_game(75, 71)).unwrap();
        assert_eq!(nice.nice_type, NiceType::Double);
        assert!(nice.nice_teams.is_empty());

        let both = NiceGame::classify(&final_game(69, 69)).unwrap();
        assert_eq!(both.nice_teams.len(), 2);
    }

    #[test]
    fn ordinary_or_unfinished_games_are_not_nice() {
        assert!(NiceGame::classify(&final_game(70, 57)).is_none());
        assert!(NiceGame::classify(&live_game(69, 50)).is_none());
    }
}
