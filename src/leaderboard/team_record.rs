use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::SIXTY_NINE_CLUB_MIN_WIN_PCT;
use crate::engine::flow::round_to;
use crate::types::{Game, League, R69Event, Side, SortOrder};

/// A team's season-level R69 record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamR69Record {
    pub team_id: String,
    pub team_name: String,
    pub conference: Option<String>,
    pub league: League,
    pub season: String,
    pub games_played: u32,
    pub r69_wins: u32,
    pub r69_losses: u32,
    /// Percent, 2 decimals. 0 when the team never reached 69 first.
    pub r69_win_pct: f64,
    pub avg_t_to_69: f64,
    pub avg_margin_at_69: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardSort {
    #[default]
    WinPct,
    R69Wins,
    R69Losses,
    GamesPlayed,
    AvgTTo69,
    AvgMarginAt69,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    pub min_games: u32,
    pub sort_by: LeaderboardSort,
    pub order: SortOrder,
}

impl Default for LeaderboardQuery {
    fn default() -> Self {
        Self {
            min_games: 5,
            sort_by: LeaderboardSort::WinPct,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTeam {
    pub rank: u32,
    #[serde(flatten)]
    pub record: TeamR69Record,
}

/// A game where the R69 team still lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrematureGame {
    pub game_id: String,
    pub game_date: String,
    pub team_id: String,
    pub team_name: String,
    pub opponent_name: String,
    pub margin_at_69: i32,
    pub t_to_69: i64,
    pub final_margin: Option<i32>,
}

#[derive(Default)]
struct Tally {
    games_played: u32,
    wins: u32,
    losses: u32,
    t_to_69_sum: i64,
    margin_sum: i64,
    r69_games: u32,
}

/// Build per-team records from final games and their primary R69 events.
///
/// Events without a resolved `r69w` still count toward the averages but not
/// toward wins or losses. Output is ordered by team id.
pub fn aggregate_team_records(games: &[Game], events: &[R69Event]) -> Vec<TeamR69Record> {
    let mut meta: BTreeMap<String, (String, Option<String>, League, String)> = BTreeMap::new();
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    for game in games.iter().filter(|g| g.is_final()) {
        for side in [Side::Home, Side::Away] {
            let team_id = game.team_id(side).to_string();
            let conference = match side {
                Side::Home => game.home_conference.clone(),
                Side::Away => game.away_conference.clone(),
            };
            meta.entry(team_id.clone()).or_insert_with(|| {
                (game.team_name(side).to_string(), conference, game.league, game.season.clone())
            });
            tallies.entry(team_id).or_default().games_played += 1;
        }
    }

    for event in events {
        let Some(tally) = tallies.get_mut(&event.team_id) else {
            continue;
        };
        match event.r69w {
            Some(true) => tally.wins += 1,
            Some(false) => tally.losses += 1,
            None => {}
        }
        tally.t_to_69_sum += event.t_to_69;
        tally.margin_sum += i64::from(event.margin_at_69);
        tally.r69_games += 1;
    }

    tallies
        .into_iter()
        .filter_map(|(team_id, tally)| {
            let (team_name, conference, league, season) = meta.remove(&team_id)?;
            let decided = tally.wins + tally.losses;
            let avg = |sum: i64| {
                if tally.r69_games == 0 {
                    0.0
                } else {
                    round_to(sum as f64 / f64::from(tally.r69_games), 2)
                }
            };
            Some(TeamR69Record {
                team_id,
                team_name,
                conference,
                league,
                season,
                games_played: tally.games_played,
                r69_wins: tally.wins,
                r69_losses: tally.losses,
                r69_win_pct: win_pct(tally.wins, decided),
                avg_t_to_69: avg(tally.t_to_69_sum),
                avg_margin_at_69: avg(tally.margin_sum),
            })
        })
        .collect()
}

/// Filter by minimum games, sort, and number the result from 1.
pub fn rank(records: &[TeamR69Record], query: &LeaderboardQuery) -> Vec<RankedTeam> {
    let mut eligible: Vec<&TeamR69Record> = records
        .iter()
        .filter(|r| r.games_played >= query.min_games)
        .collect();

    eligible.sort_by(|a, b| {
        query
            .order
            .apply(sort_key(a, query.sort_by).total_cmp(&sort_key(b, query.sort_by)))
            .then_with(|| a.team_id.cmp(&b.team_id))
    });

    eligible
        .into_iter()
        .enumerate()
        .map(|(i, record)| RankedTeam {
            rank: i as u32 + 1,
            record: record.clone(),
        })
        .collect()
}

fn sort_key(record: &TeamR69Record, sort: LeaderboardSort) -> f64 {
    match sort {
        LeaderboardSort::WinPct => record.r69_win_pct,
        LeaderboardSort::R69Wins => f64::from(record.r69_wins),
        LeaderboardSort::R69Losses => f64::from(record.r69_losses),
        LeaderboardSort::GamesPlayed => f64::from(record.games_played),
        LeaderboardSort::AvgTTo69 => record.avg_t_to_69,
        LeaderboardSort::AvgMarginAt69 => record.avg_margin_at_69,
    }
}

/// Teams that reached 69 first and lost, biggest margin at 69 first, then
/// most recent.
pub fn premature_69(pairs: &[(Game, R69Event)]) -> Vec<PrematureGame> {
    let mut out: Vec<PrematureGame> = pairs
        .iter()
        .filter(|(game, event)| event.r69w == Some(false) && game.is_final())
        .map(|(game, event)| PrematureGame {
            game_id: game.id.clone(),
            game_date: game.game_date.clone(),
            team_id: event.team_id.clone(),
            team_name: game.team_name(event.side).to_string(),
            opponent_name: game.team_name(event.side.opponent()).to_string(),
            margin_at_69: event.margin_at_69,
            t_to_69: event.t_to_69,
            final_margin: game.final_margin(event.side),
        })
        .collect();

    out.sort_by(|a, b| {
        b.margin_at_69
            .cmp(&a.margin_at_69)
            .then_with(|| b.game_date.cmp(&a.game_date))
    });
    out
}

// ---------------------------------------------------------------------------
// Conferences
// ---------------------------------------------------------------------------

/// R69 totals for one conference in one league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceRecord {
    pub conference: String,
    pub league: League,
    pub season: String,
    pub teams_count: u32,
    /// Decided R69 games (wins + losses) across member teams.
    pub total_games: u32,
    pub total_r69_wins: u32,
    pub total_r69_losses: u32,
    pub conference_r69_win_pct: f64,
    /// Mean of member teams' averages, over teams with R69 data only.
    pub avg_t_to_69: f64,
    pub avg_margin_at_69: f64,
}

#[derive(Default)]
struct ConferenceTally {
    teams: u32,
    wins: u32,
    losses: u32,
    teams_with_r69: u32,
    t_to_69_sum: f64,
    margin_sum: f64,
}

/// Group team records by (conference, league). Teams without a conference
/// are left out. Sorted by conference R69W% descending, then name.
pub fn conference_leaderboard(records: &[TeamR69Record]) -> Vec<ConferenceRecord> {
    let mut tallies: BTreeMap<(String, League), (String, ConferenceTally)> = BTreeMap::new();

    for record in records {
        let Some(conference) = &record.conference else {
            continue;
        };
        let (_, tally) = tallies
            .entry((conference.clone(), record.league))
            .or_insert_with(|| (record.season.clone(), ConferenceTally::default()));
        tally.teams += 1;
        tally.wins += record.r69_wins;
        tally.losses += record.r69_losses;
        if record.r69_wins + record.r69_losses > 0 {
            tally.teams_with_r69 += 1;
            tally.t_to_69_sum += record.avg_t_to_69;
            tally.margin_sum += record.avg_margin_at_69;
        }
    }

    let mut out: Vec<ConferenceRecord> = tallies
        .into_iter()
        .map(|((conference, league), (season, t))| {
            let decided = t.wins + t.losses;
            let avg = |sum: f64| {
                if t.teams_with_r69 == 0 {
                    0.0
                } else {
                    round_to(sum / f64::from(t.teams_with_r69), 2)
                }
            };
            ConferenceRecord {
                conference,
                league,
                season,
                teams_count: t.teams,
                total_games: decided,
                total_r69_wins: t.wins,
                total_r69_losses: t.losses,
                conference_r69_win_pct: win_pct(t.wins, decided),
                avg_t_to_69: avg(t.t_to_69_sum),
                avg_margin_at_69: avg(t.margin_sum),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.conference_r69_win_pct
            .total_cmp(&a.conference_r69_win_pct)
            .then_with(|| a.conference.cmp(&b.conference))
    });
    out
}

// ---------------------------------------------------------------------------
// 69 Club
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubMember {
    pub team_id: String,
    pub team_name: String,
    pub conference: Option<String>,
    pub league: League,
    pub games_played: u32,
    pub r69_attempts: u32,
    pub r69_wins: u32,
    pub r69_win_pct: f64,
    pub avg_t_to_69: f64,
    pub avg_margin_at_69: f64,
}

/// Teams with at least `min_attempts` decided R69 games that convert 69% or
/// more of them. Highest R69W% first.
pub fn sixty_nine_club(records: &[TeamR69Record], min_attempts: u32) -> Vec<ClubMember> {
    let mut members: Vec<ClubMember> = records
        .iter()
        .map(|r| {
            let attempts = r.r69_wins + r.r69_losses;
            ClubMember {
                team_id: r.team_id.clone(),
                team_name: r.team_name.clone(),
                conference: r.conference.clone(),
                league: r.league,
                games_played: r.games_played,
                r69_attempts: attempts,
                r69_wins: r.r69_wins,
                r69_win_pct: win_pct(r.r69_wins, attempts),
                avg_t_to_69: r.avg_t_to_69,
                avg_margin_at_69: r.avg_margin_at_69,
            }
        })
        .filter(|m| m.r69_attempts >= min_attempts && m.r69_win_pct >= SIXTY_NINE_CLUB_MIN_WIN_PCT)
        .collect();

    members.sort_by(|a, b| {
        b.r69_win_pct
            .total_cmp(&a.r69_win_pct)
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
    members
}

fn win_pct(wins: u32, decided: u32) -> f64 {
    if decided == 0 {
        0.0
    } else {
        round_to(f64::from(wins) / f64::from(decided) * 100.0, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameStatus;

    fn game(id: &str, date: &str, home: &str, away: &str, hs: i32, aws: i32) -> Game {
        Game {
            id: id.to_string(),
            league: League::Mens,
            season: "2024-25".to_string(),
            game_date: date.to_string(),
            home_team_id: home.to_string(),
            away_team_id: away.to_string(),
            home_team_name: format!("{home} U"),
            away_team_name: format!("{away} U"),
            home_conference: Some("A10".to_string()),
            away_conference: None,
            home_score: Some(hs),
            away_score: Some(aws),
            status: GameStatus::Final,
            total_periods: 2,
            overtime: false,
        }
    }

    fn r69(game: &Game, side: Side, t: i64, margin: i32, won: bool) -> R69Event {
        R69Event {
            game_id: game.id.clone(),
            team_id: game.team_id(side).to_string(),
            side,
            t_to_69: t,
            period_at_69: 2,
            margin_at_69: margin,
            score_at_69_team: 69,
            score_at_69_opponent: 69 - margin,
            team_score_at_trigger: 69,
            sequence_number: 100,
            r69w: Some(won),
        }
    }

    fn season() -> (Vec<Game>, Vec<R69Event>) {
        let g1 = game("g1", "2025-01-01", "DUKE", "UNC", 80, 70);
        let g2 = game("g2", "2025-01-08", "UNC", "DUKE", 75, 72);
        let g3 = game("g3", "2025-01-15", "DUKE", "UVA", 60, 55);
        let events = vec![
            r69(&g1, Side::Home, 1800, 10, true),
            r69(&g2, Side::Away, 2000, 4, false),
        ];
        (vec![g1, g2, g3], events)
    }

    #[test]
    fn aggregates_wins_losses_and_averages() {
        let (games, events) = season();
        let records = aggregate_team_records(&games, &events);
        assert_eq!(records.len(), 3);

        let duke = records.iter().find(|r| r.team_id == "DUKE").unwrap();
        assert_eq!(duke.games_played, 3);
        assert_eq!((duke.r69_wins, duke.r69_losses), (1, 1));
        assert_eq!(duke.r69_win_pct, 50.0);
        assert_eq!(duke.avg_t_to_69, 1900.0);
        assert_eq!(duke.avg_margin_at_69, 7.0);
        assert_eq!(duke.conference.as_deref(), Some("A10"));

        let uva = records.iter().find(|r| r.team_id == "UVA").unwrap();
        assert_eq!(uva.r69_win_pct, 0.0);
        assert_eq!(uva.avg_t_to_69, 0.0);
    }

    #[test]
    fn unfinished_games_are_not_counted() {
        let (mut games, events) = season();
        games[2].status = GameStatus::InProgress;
        let records = aggregate_team_records(&games, &events);
        assert!(records.iter().all(|r| r.team_id != "UVA"));
        let duke = records.iter().find(|r| r.team_id == "DUKE").unwrap();
        assert_eq!(duke.games_played, 2);
    }

    #[test]
    fn rank_filters_and_orders() {
        let (games, events) = season();
        let records = aggregate_team_records(&games, &events);

        let query = LeaderboardQuery {
            min_games: 2,
            sort_by: LeaderboardSort::WinPct,
            order: SortOrder::Desc,
        };
        let ranked = rank(&records, &query);
        let ids: Vec<&str> = ranked.iter().map(|r| r.record.team_id.as_str()).collect();
        assert_eq!(ids, vec!["DUKE", "UNC"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);

        let asc = rank(
            &records,
            &LeaderboardQuery {
                min_games: 1,
                sort_by: LeaderboardSort::GamesPlayed,
                order: SortOrder::Asc,
            },
        );
        assert_eq!(asc.first().unwrap().record.team_id, "UVA");
        assert_eq!(asc.last().unwrap().record.team_id, "DUKE");
    }

    #[test]
    fn premature_69_orders_by_blown_margin_then_date() {
        let g1 = game("g1", "2025-01-01", "A", "B", 70, 75);
        let g2 = game("g2", "2025-02-01", "C", "D", 71, 74);
        let g3 = game("g3", "2025-03-01", "E", "F", 72, 76);
        let g4 = game("g4", "2025-03-05", "G", "H", 90, 70);
        let pairs = vec![
            (g1.clone(), r69(&g1, Side::Home, 1500, 6, false)),
            (g2.clone(), r69(&g2, Side::Home, 1600, 12, false)),
            (g3.clone(), r69(&g3, Side::Home, 1700, 6, false)),
            (g4.clone(), r69(&g4, Side::Home, 1400, 20, true)),
        ];
        let shame = premature_69(&pairs);
        let ids: Vec<&str> = shame.iter().map(|p| p.game_id.as_str()).collect();
        assert_eq!(ids, vec!["g2", "g3", "g1"]);
        assert_eq!(shame[0].opponent_name, "D U");
        assert_eq!(shame[0].final_margin, Some(-3));
    }

    fn record(team: &str, conference: Option<&str>, wins: u32, losses: u32, t: f64, margin: f64) -> TeamR69Record {
        TeamR69Record {
            team_id: team.to_string(),
            team_name: format!("{team} U"),
            conference: conference.map(str::to_string),
            league: League::Mens,
            season: "2024-25".to_string(),
            games_played: wins + losses + 2,
            r69_wins: wins,
            r69_losses: losses,
            r69_win_pct: win_pct(wins, wins + losses),
            avg_t_to_69: t,
            avg_margin_at_69: margin,
        }
    }

    #[test]
    fn conferences_pool_member_totals() {
        let records = vec![
            record("DUKE", Some("ACC"), 8, 2, 1800.0, 6.0),
            record("UNC", Some("ACC"), 4, 4, 2000.0, 2.0),
            record("BC", Some("ACC"), 0, 0, 0.0, 0.0),
            record("UK", Some("SEC"), 9, 1, 1700.0, 8.0),
            record("IND", None, 5, 0, 1600.0, 9.0),
        ];
        let confs = conference_leaderboard(&records);
        assert_eq!(confs.len(), 2);

        let sec = &confs[0];
        assert_eq!(sec.conference, "SEC");
        assert_eq!(sec.conference_r69_win_pct, 90.0);

        let acc = &confs[1];
        assert_eq!(acc.teams_count, 3);
        assert_eq!(acc.total_games, 18);
        assert_eq!((acc.total_r69_wins, acc.total_r69_losses), (12, 6));
        assert_eq!(acc.conference_r69_win_pct, 66.67);
        // BC has no R69 games and stays out of the averages.
        assert_eq!(acc.avg_t_to_69, 1900.0);
        assert_eq!(acc.avg_margin_at_69, 4.0);
    }

    #[test]
    fn conference_split_by_league() {
        let mut womens = record("UCONN", Some("Big East"), 3, 0, 1500.0, 10.0);
        womens.league = League::Womens;
        let records = vec![record("NOVA", Some("Big East"), 1, 1, 1900.0, 3.0), womens];
        let confs = conference_leaderboard(&records);
        assert_eq!(confs.len(), 2);
        assert_eq!(confs[0].league, League::Womens);
        assert_eq!(confs[1].league, League::Mens);
    }

    #[test]
    fn club_needs_attempts_and_69_percent() {
        let records = vec![
            record("A", None, 7, 3, 1800.0, 5.0),   // 70%
            record("B", None, 9, 1, 1700.0, 7.0),   // 90%
            record("C", None, 6, 4, 1900.0, 3.0),   // 60%
            record("D", None, 5, 0, 1600.0, 9.0),   // too few attempts
        ];
        let club = sixty_nine_club(&records, 10);
        let ids: Vec<&str> = club.iter().map(|m| m.team_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(club[0].r69_attempts, 10);
        assert_eq!(club[1].r69_win_pct, 70.0);

        assert_eq!(sixty_nine_club(&records, 5).len(), 3);
    }
}
