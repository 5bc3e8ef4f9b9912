use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".EcoLedger";
const CONFIG_FILE: &str = "config.json";
const CATALOG_FILE: &str = "catalog.json";
const DEFAULT_API_PORT: u16 = 7891;
const DEFAULT_LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub catalog_path: PathBuf,
    pub api_port: u16,
    pub leaderboard_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("ledger.db"),
            catalog_path: root.join(CATALOG_FILE),
            api_port: DEFAULT_API_PORT,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        if !self.catalog_path.exists() {
            fs::write(&self.catalog_path, include_str!("../assets/catalog.json")).with_context(
                || {
                    format!(
                        "Failed to create default catalog file: {}",
                        self.catalog_path.display()
                    )
                },
            )?;
            set_mode_600(&self.catalog_path)?;
        }

        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "leaderboard_size" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("leaderboard_size must be a number"))?;
                if parsed == 0 {
                    bail!("leaderboard_size must be at least 1");
                }
                self.leaderboard_size = parsed;
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "catalog_path" => {
                self.catalog_path = expand_home(value);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_port|api.port, leaderboard_size|leaderboard.size, db_path|db.path, catalog_path|catalog.path"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_port" => Some(self.api_port.to_string()),
            "leaderboard_size" => Some(self.leaderboard_size.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "catalog_path" => Some(self.catalog_path.display().to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_port" | "api.port" => "api_port",
        "leaderboard_size" | "leaderboard.size" => "leaderboard_size",
        "db_path" | "db.path" => "db_path",
        "catalog_path" | "catalog.path" => "catalog_path",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
