use crate::core::geocoding::OPENCAGE_BASE_URL;
use crate::errors::{AppError, AppResult};
use crate::models::coords::Coordinates;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where this device is. There is no GPS on a terminal, so the position is
/// configured (or passed with `--lat/--lon`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    /// `false` behaves like a denied location permission.
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,
    /// Without a key, locations are stored as coordinates.
    pub api_key: Option<String>,
    #[serde(default = "default_geocoder_timeout")]
    pub timeout_secs: u64,
}

fn default_user_id() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string())
}
fn default_true() -> bool {
    true
}
fn default_geocoder_url() -> String {
    OPENCAGE_BASE_URL.to_string()
}
fn default_geocoder_timeout() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_confirm_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latitude: None,
            longitude: None,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            api_key: None,
            timeout_secs: default_geocoder_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_database(Self::database_file())
    }
}

impl PositionConfig {
    /// Configured position, validated. `None` when either half is missing.
    pub fn coordinates(&self) -> AppResult<Option<Coordinates>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon).map(Some),
            _ => Ok(None),
        }
    }
}

impl Config {
    fn with_database(db_path: PathBuf) -> Self {
        Self {
            database: db_path.to_string_lossy().to_string(),
            user_id: default_user_id(),
            position: PositionConfig::default(),
            geocoder: GeocoderConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            log_level: default_log_level(),
        }
    }

    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("rattendance")
        } else {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".rattendance")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("rattendance.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("rattendance.sqlite")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs.max(1))
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Initialize configuration and database files.
    ///
    /// Returns the database path that was set up.
    pub fn init_all(custom_db: Option<String>, is_test: bool) -> AppResult<PathBuf> {
        let dir = Self::config_dir();

        // DB path: user provided or default
        let db_path = match custom_db {
            Some(name) => {
                let p = Path::new(&name);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    dir.join(p)
                }
            }
            None => dir.join("rattendance.sqlite"),
        };

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if !is_test {
            fs::create_dir_all(&dir)?;
            let config = Self::with_database(db_path.clone());
            let yaml = serde_yaml::to_string(&config)?;
            let mut file = fs::File::create(Self::config_file())?;
            file.write_all(yaml.as_bytes())?;
        }

        Ok(db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rattendance.conf");
        fs::write(
            &path,
            "database: /tmp/a.sqlite\nuser_id: bob\nposition:\n  latitude: 45.0\n  longitude: 9.0\n",
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.user_id, "bob");
        assert!(cfg.position.enabled);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1000));
        assert_eq!(cfg.confirm_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.geocoder.base_url, OPENCAGE_BASE_URL);
        assert!(cfg.geocoder.api_key.is_none());
        let coords = cfg.position.coordinates().unwrap().unwrap();
        assert_eq!(coords.latitude, 45.0);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rattendance.conf");
        fs::write(&path, "database: [unterminated").unwrap();
        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn half_a_position_is_no_position() {
        let pos = PositionConfig {
            enabled: true,
            latitude: Some(1.0),
            longitude: None,
        };
        assert!(pos.coordinates().unwrap().is_none());
    }
}
