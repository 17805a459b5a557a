//! Server configuration: an optional RON file with command line and
//! environment overrides on top.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "todos.ron";
pub const DEFAULT_PORT: u16 = 7890;
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/todos";

/// Where lists and todos are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Per-session, discarded with the session.
    #[default]
    Session,
    /// Shared `PostgreSQL` database.
    Postgres,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Minutes a session may sit unused before it and its lists are dropped.
    pub session_idle_minutes: u64,
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            port: DEFAULT_PORT,
            database_url: String::from(DEFAULT_DATABASE_URL),
            max_connections: 5,
            session_idle_minutes: 30,
            tls: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

impl Config {
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes.saturating_mul(60))
    }

    /// Reads the RON file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        ron::de::from_reader(file).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    fn apply(mut self, args: Args) -> Self {
        if let Some(backend) = args.backend {
            self.backend = backend;
        }

        if let Some(port) = args.port {
            self.port = port;
        }

        if let Some(database_url) = args.database_url {
            self.database_url = database_url;
        }

        if let Some(max_connections) = args.max_connections {
            self.max_connections = max_connections;
        }

        if let Some(minutes) = args.session_idle_minutes {
            self.session_idle_minutes = minutes;
        }

        if let (Some(cert), Some(key)) = (args.ssl_cert, args.ssl_key) {
            self.tls = Some(TlsConfig { cert, key });
        }

        self
    }
}

#[derive(Debug, Parser)]
#[command(name = "todos", about = "Serve todo lists over HTTP")]
pub struct Args {
    /// RON configuration file; skipped when it does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(long, env = "TODOS_BACKEND", value_enum)]
    pub backend: Option<BackendKind>,

    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long)]
    pub max_connections: Option<u32>,

    #[arg(long)]
    pub session_idle_minutes: Option<u64>,

    #[arg(long, env = "SSL_CERT", requires = "ssl_key")]
    pub ssl_cert: Option<PathBuf>,

    #[arg(long, env = "SSL_KEY", requires = "ssl_cert")]
    pub ssl_key: Option<PathBuf>,
}

impl Args {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        Ok(Config::load(&self.config)?.apply(self))
    }
}
