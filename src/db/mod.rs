pub mod queries;

use crate::catalog::Catalog;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub total_points: i64,
    pub current_streak: i64,
    pub last_logged_date: Option<NaiveDate>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub points_value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogRow {
    pub id: i64,
    pub user_id: i64,
    pub habit_id: i64,
    pub points: i64,
    pub notes: Option<String>,
    pub logged_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BadgeRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub points_threshold: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarnedBadgeRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub earned_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentLogRow {
    pub id: i64,
    pub habit_name: String,
    pub points: i64,
    pub notes: Option<String>,
    pub logged_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub id: i64,
    pub name: String,
    pub total_points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyPointsRow {
    pub date: String,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitBreakdownRow {
    pub name: String,
    pub count: i64,
    pub points: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        // WAL + busy timeout so concurrent writers queue instead of failing.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            .context("Failed to enable WAL journal mode")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    // Immediate mode takes the write lock up front so the whole
    // read-compute-write sequence serializes across connections.
    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start transaction")
    }

    pub fn ensure_catalog(&self, catalog: &Catalog) -> Result<()> {
        let habit_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM habits", [], |row| row.get(0))
            .context("Failed to count habits")?;

        if habit_count == 0 {
            catalog.habits.iter().try_for_each(|habit| {
                self.conn
                    .execute(
                        "INSERT INTO habits (name, description, points_value) VALUES (?1, ?2, ?3)",
                        params![habit.name, habit.description, habit.points_value],
                    )
                    .with_context(|| format!("Failed to insert habit: {}", habit.name))
                    .map(|_| ())
            })?;
        }

        let badge_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM badges", [], |row| row.get(0))
            .context("Failed to count badges")?;

        if badge_count == 0 {
            catalog.badges.iter().try_for_each(|badge| {
                self.conn
                    .execute(
                        "INSERT INTO badges (name, description, icon, points_threshold) VALUES (?1, ?2, ?3, ?4)",
                        params![badge.name, badge.description, badge.icon, badge.points_threshold],
                    )
                    .with_context(|| format!("Failed to insert badge: {}", badge.name))
                    .map(|_| ())
            })?;
        }

        Ok(())
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<UserRow>> {
        get_user(&self.conn, user_id)
    }

    pub fn get_habit(&self, habit_id: i64) -> Result<Option<HabitRow>> {
        get_habit(&self.conn, habit_id)
    }

    pub fn create_user(&self, name: &str, email: &str, created_at: i64) -> Result<UserRow> {
        self.conn
            .execute(
                "INSERT INTO users (name, email, created_at) VALUES (?1, ?2, ?3)",
                params![name, email, created_at],
            )
            .context("Failed to insert user")?;

        Ok(UserRow {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            email: email.to_string(),
            total_points: 0,
            current_streak: 0,
            last_logged_date: None,
            created_at,
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, email, total_points, current_streak, last_logged_date, created_at
                 FROM users WHERE email = ?1",
                params![email],
                map_user_row,
            )
            .optional()
            .context("Failed to query user by email")?;

        Ok(row)
    }

    pub fn list_habits(&self) -> Result<Vec<HabitRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, name, description, points_value FROM habits ORDER BY name ASC",
        )?;

        let rows = statement
            .query_map([], |row| {
                Ok(HabitRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    points_value: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query habits")?;

        Ok(rows)
    }

    pub fn list_badges(&self) -> Result<Vec<BadgeRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, name, description, icon, points_threshold
             FROM badges
             ORDER BY points_threshold ASC",
        )?;

        let rows = statement
            .query_map([], map_badge_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query badges")?;

        Ok(rows)
    }

    pub fn recent_logs_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<RecentLogRow>> {
        let mut statement = self.conn.prepare(
            "SELECT l.id, h.name, l.points, l.notes, l.logged_at
             FROM activity_logs l
             JOIN habits h ON h.id = l.habit_id
             WHERE l.user_id = ?1
             ORDER BY l.logged_at DESC, l.id DESC
             LIMIT ?2",
        )?;

        let rows = statement
            .query_map(params![user_id, limit as i64], |row| {
                Ok(RecentLogRow {
                    id: row.get(0)?,
                    habit_name: row.get(1)?,
                    points: row.get(2)?,
                    notes: row.get(3)?,
                    logged_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query recent activity logs")?;

        Ok(rows)
    }

    pub fn badges_for_user(&self, user_id: i64) -> Result<Vec<EarnedBadgeRow>> {
        let mut statement = self.conn.prepare(
            "SELECT b.id, b.name, b.description, b.icon, ub.earned_at
             FROM user_badges ub
             JOIN badges b ON b.id = ub.badge_id
             WHERE ub.user_id = ?1
             ORDER BY ub.earned_at ASC, b.points_threshold ASC",
        )?;

        let rows = statement
            .query_map(params![user_id], |row| {
                Ok(EarnedBadgeRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    icon: row.get(3)?,
                    earned_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query earned badges")?;

        Ok(rows)
    }

    pub fn top_users(&self, limit: usize) -> Result<Vec<LeaderboardRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, name, total_points
             FROM users
             ORDER BY total_points DESC, id ASC
             LIMIT ?1",
        )?;

        let rows = statement
            .query_map(params![limit as i64], |row| {
                Ok(LeaderboardRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    total_points: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query leaderboard")?;

        Ok(rows)
    }

    // Days are grouped on the UTC calendar, matching the streak policy.
    pub fn daily_points_since(&self, user_id: i64, from_ts: i64) -> Result<Vec<DailyPointsRow>> {
        let mut statement = self.conn.prepare(
            "SELECT date(logged_at, 'unixepoch') AS day, SUM(points)
             FROM activity_logs
             WHERE user_id = ?1 AND logged_at >= ?2
             GROUP BY day
             ORDER BY day ASC",
        )?;

        let rows = statement
            .query_map(params![user_id, from_ts], |row| {
                Ok(DailyPointsRow {
                    date: row.get(0)?,
                    points: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query daily points")?;

        Ok(rows)
    }

    pub fn habit_breakdown_since(
        &self,
        user_id: i64,
        from_ts: i64,
    ) -> Result<Vec<HabitBreakdownRow>> {
        let mut statement = self.conn.prepare(
            "SELECT h.name, COUNT(*), SUM(l.points)
             FROM activity_logs l
             JOIN habits h ON h.id = l.habit_id
             WHERE l.user_id = ?1 AND l.logged_at >= ?2
             GROUP BY l.habit_id
             ORDER BY SUM(l.points) DESC, h.name ASC",
        )?;

        let rows = statement
            .query_map(params![user_id, from_ts], |row| {
                Ok(HabitBreakdownRow {
                    name: row.get(0)?,
                    count: row.get(1)?,
                    points: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query habit breakdown")?;

        Ok(rows)
    }

    pub fn latest_log_timestamp(&self) -> Result<Option<i64>> {
        let timestamp = self
            .conn
            .query_row(
                "SELECT logged_at FROM activity_logs ORDER BY logged_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();

        Ok(timestamp)
    }

    pub fn count_users(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")
    }

    pub fn count_habits(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM habits", [], |row| row.get(0))
            .context("Failed to count habits")
    }

    pub fn count_logs(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM activity_logs", [], |row| row.get(0))
            .context("Failed to count activity logs")
    }
}

// Row operations shared with the ledger transaction, which runs them
// against its own `Transaction` handle.

pub(crate) fn get_user(conn: &Connection, user_id: i64) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, email, total_points, current_streak, last_logged_date, created_at
             FROM users WHERE id = ?1",
            params![user_id],
            map_user_row,
        )
        .optional()
        .context("Failed to query user")?;

    Ok(row)
}

pub(crate) fn get_habit(conn: &Connection, habit_id: i64) -> Result<Option<HabitRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, description, points_value FROM habits WHERE id = ?1",
            params![habit_id],
            |row| {
                Ok(HabitRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    points_value: row.get(3)?,
                })
            },
        )
        .optional()
        .context("Failed to query habit")?;

    Ok(row)
}

pub(crate) fn insert_activity_log(
    conn: &Connection,
    user_id: i64,
    habit_id: i64,
    points: i64,
    notes: Option<&str>,
    logged_at: i64,
) -> Result<ActivityLogRow> {
    conn.execute(
        "INSERT INTO activity_logs (user_id, habit_id, points, notes, logged_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, habit_id, points, notes, logged_at],
    )
    .context("Failed to insert activity log")?;

    Ok(ActivityLogRow {
        id: conn.last_insert_rowid(),
        user_id,
        habit_id,
        points,
        notes: notes.map(ToOwned::to_owned),
        logged_at,
    })
}

pub(crate) fn apply_log_to_user(
    conn: &Connection,
    user_id: i64,
    points: i64,
    streak_fields: Option<(i64, NaiveDate)>,
) -> Result<()> {
    // The increment is relative in SQL so no read-modify-write window exists.
    let affected = match streak_fields {
        Some((current_streak, last_logged_date)) => conn.execute(
            "UPDATE users
             SET total_points = total_points + ?1, current_streak = ?2, last_logged_date = ?3
             WHERE id = ?4",
            params![points, current_streak, last_logged_date, user_id],
        ),
        None => conn.execute(
            "UPDATE users SET total_points = total_points + ?1 WHERE id = ?2",
            params![points, user_id],
        ),
    }
    .context("Failed to update user totals")?;

    if affected != 1 {
        bail!("User row disappeared during totals update: {user_id}");
    }

    Ok(())
}

pub(crate) fn user_total_points(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT total_points FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .context("Failed to read user total points")
}

pub(crate) fn unearned_badges_at_or_below(
    conn: &Connection,
    user_id: i64,
    total_points: i64,
) -> Result<Vec<BadgeRow>> {
    let mut statement = conn.prepare(
        "SELECT b.id, b.name, b.description, b.icon, b.points_threshold
         FROM badges b
         WHERE b.points_threshold <= ?1
           AND NOT EXISTS (
             SELECT 1 FROM user_badges ub WHERE ub.user_id = ?2 AND ub.badge_id = b.id
           )
         ORDER BY b.points_threshold ASC",
    )?;

    let rows = statement
        .query_map(params![total_points, user_id], map_badge_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to query qualifying badges")?;

    Ok(rows)
}

pub(crate) fn insert_user_badge(
    conn: &Connection,
    user_id: i64,
    badge_id: i64,
    earned_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO user_badges (user_id, badge_id, earned_at) VALUES (?1, ?2, ?3)",
        params![user_id, badge_id, earned_at],
    )
    .context("Failed to insert badge award")?;

    Ok(())
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        total_points: row.get(3)?,
        current_streak: row.get(4)?,
        last_logged_date: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_badge_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BadgeRow> {
    Ok(BadgeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        points_threshold: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BadgeSpec, Catalog, HabitSpec};
    use tempfile::TempDir;

    fn open_test_database() -> (TempDir, Database) {
        let dir = tempfile::tempdir().expect("temp dir");
        let database = Database::open(&dir.path().join("ledger.db")).expect("open database");
        (dir, database)
    }

    fn sample_catalog() -> Catalog {
        Catalog {
            habits: vec![
                HabitSpec {
                    name: "Cycle to work".to_string(),
                    description: None,
                    points_value: 20,
                },
                HabitSpec {
                    name: "Plant a tree".to_string(),
                    description: Some("Planting a new tree.".to_string()),
                    points_value: 50,
                },
            ],
            badges: vec![
                BadgeSpec {
                    name: "Seedling".to_string(),
                    description: "Earn 100 eco points".to_string(),
                    icon: "/badges/seedling.svg".to_string(),
                    points_threshold: 100,
                },
                BadgeSpec {
                    name: "Sapling".to_string(),
                    description: "Earn 300 eco points".to_string(),
                    icon: "/badges/sapling.svg".to_string(),
                    points_threshold: 300,
                },
            ],
        }
    }

    #[test]
    fn create_and_fetch_user() {
        let (_dir, database) = open_test_database();

        let created = database
            .create_user("Alice Green", "alice.green@example.com", 1_700_000_000)
            .expect("create user");
        let fetched = database
            .get_user(created.id)
            .expect("fetch user")
            .expect("user exists");

        assert_eq!(fetched.email, "alice.green@example.com");
        assert_eq!(fetched.total_points, 0);
        assert_eq!(fetched.current_streak, 0);
        assert!(fetched.last_logged_date.is_none());
    }

    #[test]
    fn ensure_catalog_is_idempotent() {
        let (_dir, database) = open_test_database();
        let catalog = sample_catalog();

        database.ensure_catalog(&catalog).expect("first load");
        database.ensure_catalog(&catalog).expect("second load");

        assert_eq!(database.count_habits().expect("count"), 2);
        assert_eq!(database.list_badges().expect("badges").len(), 2);
    }

    #[test]
    fn unearned_badges_excludes_already_awarded() {
        let (_dir, database) = open_test_database();
        database
            .ensure_catalog(&sample_catalog())
            .expect("catalog load");
        let user = database
            .create_user("Bob Brown", "bob.brown@example.com", 1_700_000_000)
            .expect("create user");

        let badges = database.list_badges().expect("badges");
        insert_user_badge(&database.conn, user.id, badges[0].id, 1_700_000_100)
            .expect("award badge");

        let qualifying =
            unearned_badges_at_or_below(&database.conn, user.id, 500).expect("qualifying badges");

        assert_eq!(qualifying.len(), 1);
        assert_eq!(qualifying[0].name, "Sapling");
    }

    #[test]
    fn duplicate_award_is_rejected_by_unique_index() {
        let (_dir, database) = open_test_database();
        database
            .ensure_catalog(&sample_catalog())
            .expect("catalog load");
        let user = database
            .create_user("Bob Brown", "bob.brown@example.com", 1_700_000_000)
            .expect("create user");
        let badge_id = database.list_badges().expect("badges")[0].id;

        insert_user_badge(&database.conn, user.id, badge_id, 1_700_000_100).expect("first award");
        let second = insert_user_badge(&database.conn, user.id, badge_id, 1_700_000_200);

        assert!(second.is_err());
    }

    #[test]
    fn top_users_orders_by_points() {
        let (_dir, database) = open_test_database();
        let alice = database
            .create_user("Alice Green", "alice.green@example.com", 1_700_000_000)
            .expect("create user");
        let bob = database
            .create_user("Bob Brown", "bob.brown@example.com", 1_700_000_000)
            .expect("create user");

        apply_log_to_user(&database.conn, alice.id, 30, None).expect("points");
        apply_log_to_user(&database.conn, bob.id, 80, None).expect("points");

        let top = database.top_users(10).expect("leaderboard");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Bob Brown");
        assert_eq!(top[0].total_points, 80);
    }

    #[test]
    fn aggregates_daily_points_and_habit_breakdown() {
        let (_dir, database) = open_test_database();
        database
            .ensure_catalog(&sample_catalog())
            .expect("catalog load");
        let user = database
            .create_user("Alice Green", "alice.green@example.com", 1_700_000_000)
            .expect("create user");
        let habits = database.list_habits().expect("habits");
        let cycle = habits.iter().find(|h| h.name == "Cycle to work").unwrap();
        let tree = habits.iter().find(|h| h.name == "Plant a tree").unwrap();

        // Two logs on 2023-11-14 UTC, one the next day.
        insert_activity_log(&database.conn, user.id, cycle.id, 20, None, 1_699_966_800)
            .expect("log");
        insert_activity_log(&database.conn, user.id, tree.id, 50, None, 1_699_970_400)
            .expect("log");
        insert_activity_log(&database.conn, user.id, cycle.id, 20, None, 1_700_053_200)
            .expect("log");

        let daily = database.daily_points_since(user.id, 0).expect("daily");
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, "2023-11-14");
        assert_eq!(daily[0].points, 70);
        assert_eq!(daily[1].points, 20);

        let breakdown = database.habit_breakdown_since(user.id, 0).expect("breakdown");
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].name, "Plant a tree");
        assert_eq!(breakdown[0].count, 1);
        assert_eq!(breakdown[0].points, 50);
        assert_eq!(breakdown[1].name, "Cycle to work");
        assert_eq!(breakdown[1].count, 2);
        assert_eq!(breakdown[1].points, 40);
    }

    #[test]
    fn recent_logs_join_habit_names() {
        let (_dir, database) = open_test_database();
        database
            .ensure_catalog(&sample_catalog())
            .expect("catalog load");
        let user = database
            .create_user("Alice Green", "alice.green@example.com", 1_700_000_000)
            .expect("create user");
        let habit_id = database.list_habits().expect("habits")[0].id;

        insert_activity_log(
            &database.conn,
            user.id,
            habit_id,
            20,
            Some("rode the long way"),
            1_700_000_100,
        )
        .expect("log");

        let recent = database.recent_logs_for_user(user.id, 10).expect("recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].habit_name, "Cycle to work");
        assert_eq!(recent[0].notes.as_deref(), Some("rode the long way"));
    }
}
