pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  name             TEXT NOT NULL,
  email            TEXT NOT NULL UNIQUE,
  total_points     INTEGER NOT NULL DEFAULT 0,
  current_streak   INTEGER NOT NULL DEFAULT 0,
  last_logged_date TEXT,
  created_at       INTEGER NOT NULL
);
"#;

pub const CREATE_HABITS: &str = r#"
CREATE TABLE IF NOT EXISTS habits (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  name         TEXT NOT NULL UNIQUE,
  description  TEXT,
  points_value INTEGER NOT NULL DEFAULT 0
);
"#;

pub const CREATE_ACTIVITY_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS activity_logs (
  id        INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id   INTEGER NOT NULL REFERENCES users(id),
  habit_id  INTEGER NOT NULL REFERENCES habits(id),
  points    INTEGER NOT NULL DEFAULT 0,
  notes     TEXT,
  logged_at INTEGER NOT NULL
);
"#;

pub const CREATE_BADGES: &str = r#"
CREATE TABLE IF NOT EXISTS badges (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  name             TEXT NOT NULL UNIQUE,
  description      TEXT NOT NULL DEFAULT '',
  icon             TEXT NOT NULL DEFAULT '',
  points_threshold INTEGER NOT NULL DEFAULT 0
);
"#;

pub const CREATE_USER_BADGES: &str = r#"
CREATE TABLE IF NOT EXISTS user_badges (
  id        INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id   INTEGER NOT NULL REFERENCES users(id),
  badge_id  INTEGER NOT NULL REFERENCES badges(id),
  earned_at INTEGER NOT NULL,
  UNIQUE(user_id, badge_id)
);
"#;

pub const INDEX_ACTIVITY_LOGS_USER_LOGGED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_activity_logs_user_logged_at ON activity_logs(user_id, logged_at);";

pub const INDEX_USER_BADGES_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_user_badges_user ON user_badges(user_id);";

pub const INDEX_BADGES_THRESHOLD: &str =
    "CREATE INDEX IF NOT EXISTS idx_badges_threshold ON badges(points_threshold);";

pub const INDEX_USERS_TOTAL_POINTS: &str =
    "CREATE INDEX IF NOT EXISTS idx_users_total_points ON users(total_points);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_HABITS,
        CREATE_ACTIVITY_LOGS,
        CREATE_BADGES,
        CREATE_USER_BADGES,
        INDEX_ACTIVITY_LOGS_USER_LOGGED_AT,
        INDEX_USER_BADGES_USER,
        INDEX_BADGES_THRESHOLD,
        INDEX_USERS_TOTAL_POINTS,
    ]
}
