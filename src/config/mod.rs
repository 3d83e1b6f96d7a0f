use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

pub mod migrate; // use submodule at src/config/migrate.rs

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: String,
    /// Authoritative token lifetime, enforced only by the validator.
    #[serde(default = "default_token_validity_ms")]
    pub token_validity_ms: u64,
    /// Host redisplay cadence. Cosmetic, never used for expiry.
    #[serde(default = "default_display_refresh_ms")]
    pub display_refresh_ms: u64,
    #[serde(default = "default_count_refresh_ms")]
    pub count_refresh_ms: u64,
    #[serde(default = "default_position_timeout_ms")]
    pub position_timeout_ms: u64,
    #[serde(default)]
    pub max_future_skew_ms: Option<u64>,
    #[serde(default = "default_radius_m")]
    pub default_radius_m: f64,
}

fn default_token_validity_ms() -> u64 {
    10_000
}
fn default_display_refresh_ms() -> u64 {
    3_000
}
fn default_count_refresh_ms() -> u64 {
    5_000
}
fn default_position_timeout_ms() -> u64 {
    15_000
}
fn default_radius_m() -> f64 {
    50.0
}

/// Keys every config file is expected to carry, used by `config --check`.
pub const KNOWN_KEYS: &[&str] = &[
    "database",
    "token_validity_ms",
    "display_refresh_ms",
    "count_refresh_ms",
    "position_timeout_ms",
    "max_future_skew_ms",
    "default_radius_m",
];

impl Default for Config {
    fn default() -> Self {
        let db_path = Self::database_file();
        Self::with_database(db_path.to_string_lossy().to_string())
    }
}

impl Config {
    pub fn with_database(database: String) -> Self {
        Self {
            database,
            token_validity_ms: default_token_validity_ms(),
            display_refresh_ms: default_display_refresh_ms(),
            count_refresh_ms: default_count_refresh_ms(),
            position_timeout_ms: default_position_timeout_ms(),
            max_future_skew_ms: None,
            default_radius_m: default_radius_m(),
        }
    }

    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("rcheckin")
        } else {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".rcheckin")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("rcheckin.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("rcheckin.sqlite")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        let path = Self::config_file();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let cfg: Config = serde_yaml::from_str(&content)?;
            cfg.validate()?;
            Ok(cfg)
        } else {
            Ok(Config::default())
        }
    }

    /// The two timers must stay independent: a refresh cadence that is not
    /// shorter than the validity window would let the displayed token expire
    /// while still on screen.
    pub fn validate(&self) -> AppResult<()> {
        if self.token_validity_ms == 0 {
            return Err(AppError::Config("token_validity_ms must be > 0".into()));
        }
        if self.display_refresh_ms == 0 || self.display_refresh_ms >= self.token_validity_ms {
            return Err(AppError::Config(format!(
                "display_refresh_ms ({}) must be > 0 and shorter than token_validity_ms ({})",
                self.display_refresh_ms, self.token_validity_ms
            )));
        }
        if self.count_refresh_ms == 0 || self.position_timeout_ms == 0 {
            return Err(AppError::Config(
                "count_refresh_ms and position_timeout_ms must be > 0".into(),
            ));
        }
        if self.default_radius_m.is_nan() || self.default_radius_m <= 0.0 {
            return Err(AppError::Config("default_radius_m must be > 0".into()));
        }
        Ok(())
    }

    pub fn token_validity(&self) -> Duration {
        Duration::from_millis(self.token_validity_ms)
    }

    pub fn display_refresh(&self) -> Duration {
        Duration::from_millis(self.display_refresh_ms)
    }

    pub fn count_refresh(&self) -> Duration {
        Duration::from_millis(self.count_refresh_ms)
    }

    pub fn position_timeout(&self) -> Duration {
        Duration::from_millis(self.position_timeout_ms)
    }

    /// Initialize configuration and database files
    pub fn init_all(custom_name: Option<String>, is_test: bool) -> AppResult<Config> {
        let dir = Self::config_dir();

        // DB name: user provided or default
        let db_path = if let Some(name) = custom_name {
            let p = std::path::Path::new(&name);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                dir.join(p)
            }
        } else {
            dir.join("rcheckin.sqlite")
        };

        let config = Config::with_database(db_path.to_string_lossy().to_string());

        // Write config file
        if !is_test {
            fs::create_dir_all(&dir)?;
            let yaml = serde_yaml::to_string(&config)?;
            let mut file = fs::File::create(Self::config_file())?;
            file.write_all(yaml.as_bytes())?;
            println!("✅ Config file: {:?}", Self::config_file());
        }

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Create empty DB file if not exists
        if !db_path.exists() {
            fs::File::create(&db_path)?;
        }

        println!("✅ Database:    {:?}", db_path);

        Ok(config)
    }
}
