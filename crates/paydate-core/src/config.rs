//! Application configuration (TOML)

use crate::error::{Error, Result};
use crate::statement::StatementLayout;
use crate::table::{HeaderSpec, TabularSource};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one tabular source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub store_id: String,
    pub sheet: String,
    /// Defaults to columns A..FG of the sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_range: Option<String>,
    pub first_header: String,
    pub last_header: String,
}

impl SourceConfig {
    pub fn to_source(&self) -> TabularSource {
        let source = TabularSource::new(
            self.store_id.clone(),
            self.sheet.clone(),
            HeaderSpec::new(self.first_header.clone(), self.last_header.clone()),
        );
        match &self.discovery_range {
            Some(range) => source.with_discovery_range(range.clone()),
            None => source,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `<store_id>/<sheet>.csv` files
    pub store_root: PathBuf,
    /// Seconds between access list refreshes
    pub refresh_interval_secs: u64,
    /// Orders table whose payment dates are filled
    pub payments: SourceConfig,
    /// Allow-list table
    pub access: SourceConfig,
    pub statement: StatementLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("data"),
            refresh_interval_secs: 60,
            payments: SourceConfig {
                store_id: "orders".to_string(),
                sheet: "Заказы".to_string(),
                discovery_range: None,
                first_header: "Дата оплаты".to_string(),
                last_header: "№ счета".to_string(),
            },
            access: SourceConfig {
                store_id: "access".to_string(),
                sheet: "Data".to_string(),
                discovery_range: None,
                first_header: "Chat ID".to_string(),
                last_header: "User name".to_string(),
            },
            statement: StatementLayout::default(),
        }
    }
}

impl AppConfig {
    /// Load a config file; missing keys take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(Error::Config("refresh_interval_secs must be positive".to_string()));
        }
        for (name, source) in [("payments", &self.payments), ("access", &self.access)] {
            if source.first_header == source.last_header {
                return Err(Error::Config(format!(
                    "[{}] first_header and last_header must differ",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn payments_source(&self) -> TabularSource {
        self.payments.to_source()
    }

    pub fn access_source(&self) -> TabularSource {
        self.access.to_source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::default_discovery_range;

    #[test]
    fn test_default_sources() {
        let config = AppConfig::default();

        let payments = config.payments_source();
        assert_eq!(payments.discovery_range, default_discovery_range("Заказы"));
        assert_eq!(payments.headers, HeaderSpec::new("Дата оплаты", "№ счета"));

        let access = config.access_source();
        assert_eq!(access.discovery_range, "Data!A1:FG");
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paydate.toml");

        let mut config = AppConfig::default();
        config.access.discovery_range = Some("Data!A1:C".to_string());
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.access_source().discovery_range, "Data!A1:C");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paydate.toml");
        fs::write(
            &path,
            r#"
store_root = "/srv/paydate"
refresh_interval_secs = 30

[statement]
sheet_index = 1
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.store_root, PathBuf::from("/srv/paydate"));
        assert_eq!(config.refresh_interval_secs, 30);
        assert_eq!(config.statement.sheet_index, 1);
        assert_eq!(config.statement.date_header, "Дата проводки");
        assert_eq!(config.payments.sheet, "Заказы");
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paydate.toml");

        fs::write(&path, "refresh_interval_secs = 0\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(Error::Config(_))));

        fs::write(&path, "refresh_interval_secs = \"soon\"\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(Error::Config(_))));

        assert!(matches!(
            AppConfig::load(dir.path().join("missing.toml")),
            Err(Error::FileRead { .. })
        ));
    }
}
