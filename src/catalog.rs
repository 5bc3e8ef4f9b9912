use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub points_value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub points_threshold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub habits: Vec<HabitSpec>,
    pub badges: Vec<BadgeSpec>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let parsed: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        let mut habit_names = HashSet::new();
        for habit in &self.habits {
            if habit.name.trim().is_empty() {
                bail!("Habit name must not be empty");
            }
            if habit.points_value < 0 {
                bail!("Habit '{}' has a negative points_value", habit.name);
            }
            if !habit_names.insert(habit.name.as_str()) {
                bail!("Duplicate habit name in catalog: {}", habit.name);
            }
        }

        let mut badge_names = HashSet::new();
        for badge in &self.badges {
            if badge.name.trim().is_empty() {
                bail!("Badge name must not be empty");
            }
            if badge.points_threshold < 0 {
                bail!("Badge '{}' has a negative points_threshold", badge.name);
            }
            if !badge_names.insert(badge.name.as_str()) {
                bail!("Duplicate badge name in catalog: {}", badge.name);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BadgeSpec, Catalog, HabitSpec};

    #[test]
    fn bundled_catalog_parses_and_validates() {
        let catalog: Catalog =
            serde_json::from_str(include_str!("../assets/catalog.json")).expect("bundled catalog");

        catalog.validate().expect("bundled catalog is valid");
        assert!(!catalog.habits.is_empty());
        assert!(!catalog.badges.is_empty());
    }

    #[test]
    fn rejects_negative_points_value() {
        let catalog = Catalog {
            habits: vec![HabitSpec {
                name: "Backwards habit".to_string(),
                description: None,
                points_value: -5,
            }],
            badges: Vec::new(),
        };

        assert!(catalog.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_badge_names() {
        let badge = BadgeSpec {
            name: "Seedling".to_string(),
            description: String::new(),
            icon: String::new(),
            points_threshold: 100,
        };
        let catalog = Catalog {
            habits: Vec::new(),
            badges: vec![badge.clone(), badge],
        };

        assert!(catalog.validate().is_err());
    }
}
