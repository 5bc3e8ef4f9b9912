pub mod streak;

use crate::db::{self, ActivityLogRow, BadgeRow, Database};
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("habit not found with id {0}")]
    HabitNotFound(i64),

    #[error("user not found with id {0}")]
    UserNotFound(i64),

    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct LogOutcome {
    pub log: ActivityLogRow,
    pub points_earned: i64,
    pub total_points: i64,
    pub current_streak: i64,
    pub new_badges: Vec<BadgeRow>,
}

/// Records one activity for one user: the log row, the point increment, the
/// streak transition and any newly qualified badge awards commit together or
/// not at all. `today` is the caller's UTC calendar day and `now` the unix
/// timestamp stamped on the log and on any awards.
pub fn log_activity(
    database: &mut Database,
    user_id: i64,
    habit_id: i64,
    notes: Option<&str>,
    today: NaiveDate,
    now: i64,
) -> Result<LogOutcome, LedgerError> {
    let tx = database.transaction()?;

    let habit = db::get_habit(&tx, habit_id)?.ok_or(LedgerError::HabitNotFound(habit_id))?;
    let user = db::get_user(&tx, user_id)?.ok_or(LedgerError::UserNotFound(user_id))?;

    let update = streak::advance(
        streak::LastLog::from_stored(user.last_logged_date),
        user.current_streak,
        today,
    );

    let log = db::insert_activity_log(&tx, user_id, habit_id, habit.points_value, notes, now)?;
    db::apply_log_to_user(&tx, user_id, habit.points_value, update.fields())?;

    let total_points = db::user_total_points(&tx, user_id)?;
    let current_streak = match update {
        streak::StreakUpdate::Set { current_streak, .. } => current_streak,
        streak::StreakUpdate::Unchanged => user.current_streak,
    };

    let new_badges = db::unearned_badges_at_or_below(&tx, user_id, total_points)?;
    for badge in &new_badges {
        db::insert_user_badge(&tx, user_id, badge.id, now)?;
    }

    tx.commit()
        .context("Failed to commit activity log transaction")?;

    Ok(LogOutcome {
        log,
        points_earned: habit.points_value,
        total_points,
        current_streak,
        new_badges,
    })
}
