use std::path::PathBuf;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Runtime settings read from the process environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub data_dir: Option<PathBuf>,
    pub frontend_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        fn parsed<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
            match raw {
                None => Ok(default),
                Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }),
            }
        }

        let db_max_connections = parsed("BBS_DB_MAX_CONNECTIONS", get("BBS_DB_MAX_CONNECTIONS"), 5u32)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid { name: "BBS_DB_MAX_CONNECTIONS", value: "0".into() });
        }

        Ok(Self {
            bind_addr: get("BBS_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed("BBS_PORT", get("BBS_PORT"), 8080u16)?,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            data_dir: get("BBS_DATA_DIR").map(PathBuf::from),
            frontend_url: get("FRONTEND_URL"),
        })
    }

    /// Connection string for the Postgres backend.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}
