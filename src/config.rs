use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Builder factory settings, read from the `criteria` section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CriteriaConfig {
    /// Name of the dialect resolved from the [`DialectRegistry`](crate::dialect::DialectRegistry)
    #[serde(default = "default_dialect")]
    pub dialect: String,
    /// Parameter name reserved for the pagination id list
    #[serde(default = "default_id_param_name")]
    pub id_param_name: String,
    /// Count distinct root ids when collection-valued joins are present and the
    /// query is not grouped
    #[serde(default = "default_count_distinct")]
    pub count_distinct_collection_joins: bool,
}

fn default_dialect() -> String {
    "postgresql".to_string()
}

fn default_id_param_name() -> String {
    "ids".to_string()
}

fn default_count_distinct() -> bool {
    true
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            id_param_name: default_id_param_name(),
            count_distinct_collection_joins: default_count_distinct(),
        }
    }
}

impl CriteriaConfig {
    /// Load the criteria configuration from `config/config.toml`, falling back to env vars.
    ///
    /// Environment variables use the `LIFEGUARD` prefix and `__` separator, e.g.
    /// `LIFEGUARD__CRITERIA__DIALECT=mysql`. A missing `criteria` section yields the
    /// defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/config.toml").required(false))
            .add_source(Environment::with_prefix("LIFEGUARD").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // The file existed but could not be read or parsed
                if std::path::Path::new("config/config.toml").exists() {
                    log::warn!("Failed to load config file, falling back to env. Error: {}", err);
                }
                Config::builder()
                    .add_source(Environment::with_prefix("LIFEGUARD").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<CriteriaConfig>("criteria") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(CriteriaConfig::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Criteria configuration could not be loaded from file or environment: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<CriteriaConfig, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        CriteriaConfig::from_settings(&settings)
    }

    #[test]
    fn test_defaults() {
        let cfg = CriteriaConfig::default();
        assert_eq!(cfg.dialect, "postgresql");
        assert_eq!(cfg.id_param_name, "ids");
        assert!(cfg.count_distinct_collection_joins);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let cfg = from_toml("[database]\nurl = \"postgres://localhost\"\n").unwrap();
        assert_eq!(cfg, CriteriaConfig::default());
    }

    #[test]
    fn test_partial_section() {
        let cfg = from_toml("[criteria]\ndialect = \"mysql\"\n").unwrap();
        assert_eq!(cfg.dialect, "mysql");
        assert_eq!(cfg.id_param_name, "ids");
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let err = from_toml("[criteria]\ncount_distinct_collection_joins = \"sometimes\"\n").unwrap_err();
        assert!(err.to_string().contains("Criteria configuration"));
    }
}
