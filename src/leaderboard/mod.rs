pub mod nice_games;
pub mod team_record;

pub use nice_games::{NiceGame, NiceType};
pub use team_record::{
    aggregate_team_records, conference_leaderboard, premature_69, rank, sixty_nine_club, ClubMember,
    ConferenceRecord, LeaderboardQuery, LeaderboardSort, PrematureGame, RankedTeam, TeamR69Record,
};
