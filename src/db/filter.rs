use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::config::MAX_PAGE_SIZE;
use crate::error::{AppError, Result};
use crate::types::{GameStatus, League, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameSort {
    #[default]
    GameDate,
    HomeScore,
    AwayScore,
}

impl GameSort {
    fn column(self) -> &'static str {
        match self {
            GameSort::GameDate => "game_date",
            GameSort::HomeScore => "home_score",
            GameSort::AwayScore => "away_score",
        }
    }
}

/// Typed game query. Every optional field narrows the result; unset fields
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameFilter {
    pub league: Option<League>,
    pub season: Option<String>,
    /// Matches either team's conference.
    pub conference: Option<String>,
    pub status: Option<GameStatus>,
    /// Matches either home or away team.
    pub team_id: Option<String>,
    /// Inclusive ISO date bounds (YYYY-MM-DD).
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub sort_by: GameSort,
    pub order: SortOrder,
}

impl Default for GameFilter {
    fn default() -> Self {
        Self {
            league: None,
            season: None,
            conference: None,
            status: None,
            team_id: None,
            date_from: None,
            date_to: None,
            page: 1,
            page_size: 50,
            sort_by: GameSort::GameDate,
            order: SortOrder::Desc,
        }
    }
}

impl GameFilter {
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(AppError::Filter("page starts at 1".to_string()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::Filter(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        for date in [&self.date_from, &self.date_to].into_iter().flatten() {
            if !is_iso_date(date) {
                return Err(AppError::Filter(format!("dates must be YYYY-MM-DD, got {date:?}")));
            }
        }
        if let (Some(from), Some(to)) = (&self.date_from, &self.date_to) {
            if from > to {
                return Err(AppError::Filter(format!("date_from {from} is after date_to {to}")));
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    /// Append `WHERE ...` for the set fields. The builder must end right
    /// after the `FROM` clause.
    pub(crate) fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(league) = self.league {
            qb.push(" AND league = ").push_bind(league.to_string());
        }
        if let Some(season) = &self.season {
            qb.push(" AND season = ").push_bind(season.clone());
        }
        if let Some(conference) = &self.conference {
            qb.push(" AND (home_conference = ")
                .push_bind(conference.clone())
                .push(" OR away_conference = ")
                .push_bind(conference.clone())
                .push(")");
        }
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(team_id) = &self.team_id {
            qb.push(" AND (home_team_id = ")
                .push_bind(team_id.clone())
                .push(" OR away_team_id = ")
                .push_bind(team_id.clone())
                .push(")");
        }
        if let Some(from) = &self.date_from {
            qb.push(" AND game_date >= ").push_bind(from.clone());
        }
        if let Some(to) = &self.date_to {
            qb.push(" AND game_date <= ").push_bind(to.clone());
        }
    }

    pub(crate) fn push_order_and_page(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" ORDER BY ")
            .push(self.sort_by.column())
            .push(" ")
            .push(self.order.as_sql())
            .push(", id ASC LIMIT ")
            .push_bind(i64::from(self.page_size))
            .push(" OFFSET ")
            .push_bind(self.offset());
    }
}

fn is_iso_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}
