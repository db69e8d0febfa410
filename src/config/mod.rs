use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where raw scraper dumps are read from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// A `.json` / `.csv` file or a directory of them
    #[serde(default = "default_input_path")]
    pub path: PathBuf,
}

/// Housing-type and neighborhood tables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaxonomyConfig {
    /// TOML taxonomy file; built-in Douala/Yaoundé tables when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Normalization settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Date listings with no readable date in the current month
    #[serde(default = "default_true")]
    pub date_fallback_current: bool,

    /// Pin "today" (YYYY-MM-DD) for relative dates; system date when unset
    #[serde(default)]
    pub reference_date: Option<chrono::NaiveDate>,
}

/// Export settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Also write the normalized and deduplicated listing sets
    #[serde(default = "default_true")]
    pub save_listings: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_input_path() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_concurrency() -> usize {
    4
}
fn default_chunk_size() -> usize {
    500
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}
fn default_true() -> bool {
    true
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            chunk_size: default_chunk_size(),
            date_fallback_current: true,
            reference_date: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            save_listings: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("RENT").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            taxonomy: TaxonomyConfig::default(),
            pipeline: PipelineConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = from_toml("");
        assert_eq!(cfg.input.path, PathBuf::from("data/raw"));
        assert_eq!(cfg.pipeline.concurrency, 4);
        assert!(cfg.pipeline.date_fallback_current);
        assert!(cfg.taxonomy.path.is_none());
        assert_eq!(cfg.output.dir, PathBuf::from("outputs"));
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = from_toml(
            r#"
            [pipeline]
            concurrency = 1
            date_fallback_current = false
            reference_date = "2025-06-15"

            [taxonomy]
            path = "config/taxonomy.toml"
            "#,
        );
        assert_eq!(cfg.pipeline.concurrency, 1);
        assert!(!cfg.pipeline.date_fallback_current);
        assert_eq!(
            cfg.pipeline.reference_date,
            chrono::NaiveDate::from_ymd_opt(2025, 6, 15)
        );
        assert_eq!(cfg.taxonomy.path, Some(PathBuf::from("config/taxonomy.toml")));
        assert_eq!(cfg.pipeline.chunk_size, 500);
    }
}
