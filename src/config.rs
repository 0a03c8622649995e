use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dropbook",
    about = "Tracker for airdrop farming and rug-pull token records"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend to use
    #[arg(long, value_enum)]
    pub backend: Option<StorageBackend>,
}

/// Which persistence adapter the process runs on. Chosen once at startup.
#[derive(Deserialize, ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files under the data directory
    #[default]
    File,
    /// SQLite database under the data directory
    Sqlite,
    /// Redis, one key per collection
    Redis,
    /// Process-local key-value map, lost on exit
    Memory,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for JSON files, or the database file for sqlite
    pub path: Option<PathBuf>,
    pub redis_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "dropbook_session".to_string(),
            session_hours: 720,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(backend) = cli.backend {
            config.storage.backend = backend;
        }

        // Resolve storage path relative to data dir
        let default_path = match config.storage.backend {
            StorageBackend::Sqlite => data_dir.join("dropbook.db"),
            _ => data_dir.join("data"),
        };
        config.storage.path = Some(match config.storage.path.take() {
            Some(path) if path.is_relative() => data_dir.join(path),
            Some(path) => path,
            None => default_path,
        });

        if config.storage.backend == StorageBackend::Redis && config.storage.redis_url.is_none()
        {
            anyhow::bail!("storage.redis_url is required for the redis backend");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dropbook")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_in(dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
            backend: None,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.auth.cookie_name, "dropbook_session");
        assert_eq!(config.auth.session_hours, 720);
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn data_dir_defaults_to_home_dot_dropbook() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
            backend: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".dropbook"));
    }

    #[test]
    fn load_with_no_config_file_uses_file_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_in(tmp.path())).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.path, Some(tmp.path().join("data")));
    }

    #[test]
    fn sqlite_backend_defaults_to_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cli = cli_in(tmp.path());
        cli.backend = Some(StorageBackend::Sqlite);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.storage.path, Some(tmp.path().join("dropbook.db")));
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "127.0.0.1"
port = 9000

[storage]
backend = "redis"
redis_url = "redis://127.0.0.1/"

[auth]
session_hours = 24
"#,
        )
        .unwrap();

        let mut cli = cli_in(tmp.path());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(
            config.storage.redis_url.as_deref(),
            Some("redis://127.0.0.1/")
        );
        assert_eq!(config.auth.session_hours, 24);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000

[storage]
backend = "sqlite"
path = "custom.db"
"#,
        )
        .unwrap();

        let mut cli = cli_in(tmp.path());
        cli.config = Some(config_path);
        cli.port = Some(4000);
        cli.backend = Some(StorageBackend::Memory);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.path, Some(tmp.path().join("custom.db")));
    }

    #[test]
    fn redis_backend_requires_url() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cli = cli_in(tmp.path());
        cli.backend = Some(StorageBackend::Redis);
        assert!(Config::load(&cli).is_err());
    }
}
