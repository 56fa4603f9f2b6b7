//! Configuration document: two lists of proxy instances, one per wire
//! protocol, loaded from a single YAML file.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_MAX_IDLE_CONN_COUNT: u32 = 1;
const DEFAULT_MAX_OPEN_CONNS_COUNT: u32 = 10;
const DEFAULT_CONN_MAX_LIFETIME_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(rename = "PostgreSQL", default)]
    pub postgres_proxies: Vec<Proxy>,
    #[serde(rename = "MySQL", default)]
    pub mysql_proxies: Vec<Proxy>,
}

#[derive(Debug, Deserialize)]
pub struct Proxy {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ServerConfig")]
    pub server: ServerConfig,
    #[serde(rename = "DB")]
    pub db: Db,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "ProxyAddr")]
    pub proxy_addr: String,
}

#[derive(Debug, Deserialize)]
pub struct Db {
    #[serde(rename = "Main")]
    pub main: MainDb,
    #[serde(rename = "Secondaries")]
    pub secondaries: Vec<SecondaryDb>,
}

#[derive(Debug, Deserialize)]
pub struct MainDb {
    #[serde(rename = "Addr")]
    pub addr: String,
}

#[derive(Debug, Deserialize)]
pub struct SecondaryDb {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "DbName")]
    pub db_name: String,
    #[serde(rename = "Weight")]
    pub weight: i32,
    #[serde(rename = "MaxIdleConnCount", default)]
    pub max_idle_conn_count: Option<u32>,
    #[serde(rename = "MaxOpenConnsCount", default)]
    pub max_open_conns_count: Option<u32>,
    #[serde(rename = "ConnMaxLifetime", default)]
    pub conn_max_lifetime_secs: Option<u64>,
}

impl SecondaryDb {
    pub fn max_idle_conn_count(&self) -> u32 {
        self.max_idle_conn_count
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_MAX_IDLE_CONN_COUNT)
    }

    pub fn max_open_conns_count(&self) -> u32 {
        self.max_open_conns_count
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_MAX_OPEN_CONNS_COUNT)
    }

    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(
            self.conn_max_lifetime_secs
                .filter(|&v| v > 0)
                .unwrap_or(DEFAULT_CONN_MAX_LIFETIME_SECS),
        )
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_proxy_lists_from_yaml() {
        let yaml = r#"
PostgreSQL:
  - Name: pg-main
    ServerConfig:
      ProxyAddr: "0.0.0.0:6432"
    DB:
      Main:
        Addr: "primary:5432"
      Secondaries:
        - Name: replica-a
          Host: replica-a
          Port: 5432
          User: ro
          Password: secret
          DbName: app
          Weight: 3
MySQL: []
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.postgres_proxies.len(), 1);
        assert_eq!(cfg.mysql_proxies.len(), 0);
        let secondary = &cfg.postgres_proxies[0].db.secondaries[0];
        assert_eq!(secondary.weight, 3);
    }

    #[test]
    fn unset_pool_tunables_fall_back_to_documented_defaults() {
        let secondary = SecondaryDb {
            name: "r".into(),
            host: "h".into(),
            port: 5432,
            user: "u".into(),
            password: "p".into(),
            db_name: "d".into(),
            weight: 1,
            max_idle_conn_count: None,
            max_open_conns_count: None,
            conn_max_lifetime_secs: None,
        };
        assert_eq!(secondary.max_idle_conn_count(), 1);
        assert_eq!(secondary.max_open_conns_count(), 10);
        assert_eq!(secondary.conn_max_lifetime(), Duration::from_secs(60));
    }
}
