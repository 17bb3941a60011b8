use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory holding the bronze/silver/gold artifact folders.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Path of the SQLite sink database.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Per-source collector settings, keyed by source id ("paranagua", "santos").
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    #[serde(default)]
    pub validation: ValidationRules,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub name: String,
    pub code: String,
}

/// Record-level validation rules consumed by the `Validator`.
///
/// All of these are externally supplied; the validator itself carries no
/// hard-coded vocabularies or bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRules {
    #[serde(default = "default_required_columns")]
    pub required_columns: Vec<String>,
    #[serde(default = "default_valid_ports")]
    pub valid_ports: Vec<String>,
    #[serde(default = "default_valid_directions")]
    pub valid_directions: Vec<String>,
    #[serde(default = "default_min_volume")]
    pub min_volume: f64,
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            required_columns: default_required_columns(),
            valid_ports: default_valid_ports(),
            valid_directions: default_valid_directions(),
            min_volume: default_min_volume(),
            max_volume: default_max_volume(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./ship_lineup.db")
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_required_columns() -> Vec<String> {
    ["porto", "navio", "produto", "sentido", "volume", "data_chegada"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_valid_ports() -> Vec<String> {
    vec!["PARANAGUÁ".to_string(), "SANTOS".to_string()]
}

fn default_valid_directions() -> Vec<String> {
    // AMBOS is accepted here although no standardization mapping produces it.
    vec![
        "EXPORTAÇÃO".to_string(),
        "IMPORTAÇÃO".to_string(),
        "AMBOS".to_string(),
    ]
}

fn default_min_volume() -> f64 {
    0.0
}

fn default_max_volume() -> f64 {
    10_000_000.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: default_database_path(),
            request_timeout_secs: default_timeout(),
            max_retries: default_retries(),
            sources: BTreeMap::new(),
            validation: ValidationRules::default(),
        }
    }
}

impl Config {
    /// Load configuration from `config.toml` (or `$LINEUP_CONFIG`), with
    /// `.env` overrides applied first.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path =
            std::env::var("LINEUP_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path, e
            ))
        })?;

        let mut config: Config = toml::from_str(&config_content)?;

        if let Ok(db) = std::env::var("LINEUP_DATABASE_PATH") {
            config.database_path = PathBuf::from(db);
        }

        Ok(config)
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.data_dir.join("silver")
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.data_dir.join("gold")
    }

    /// Create the artifact directory tree if it does not exist.
    pub fn create_directories(&self) -> Result<()> {
        for dir in [
            self.data_dir.as_path(),
            &self.bronze_dir(),
            &self.silver_dir(),
            &self.gold_dir(),
            Path::new("logs"),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_match_business_vocabulary() {
        let rules = ValidationRules::default();
        assert_eq!(rules.required_columns.len(), 6);
        assert!(rules.valid_ports.contains(&"PARANAGUÁ".to_string()));
        assert!(rules.valid_directions.contains(&"AMBOS".to_string()));
        assert_eq!(rules.max_volume, 10_000_000.0);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_src = r#"
            data_dir = "/tmp/lineup-data"

            [sources.paranagua]
            url = "https://example.test/lineup"
            name = "Porto de Paranaguá"
            code = "PAR"

            [validation]
            min_volume = 1.0
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lineup-data"));
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.sources["paranagua"].code, "PAR");
        assert_eq!(config.validation.min_volume, 1.0);
        // Unset vocabularies fall back to the defaults.
        assert_eq!(config.validation.valid_ports.len(), 2);
    }
}
