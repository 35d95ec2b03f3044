use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_WORKBOOK: &str = "data/task_manager.xlsx";
const DEFAULT_ALLOWED_ORIGINS: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parses a comma-separated allow-list. A `*` entry anywhere allows every origin.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(ToString::to_string)
            .collect();
        if origins.iter().any(|origin| origin == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }

    /// Credentialed cross-origin requests are only allowed with an explicit list.
    pub fn allows_credentials(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub workbook_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub allowed_origins: AllowedOrigins,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("TASK_MANAGER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid TASK_MANAGER_BIND '{}'", bind_raw))?;

        let workbook_path = lookup("TASK_MANAGER_WORKBOOK")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKBOOK));

        let log_dir = lookup("TASK_MANAGER_LOG_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let allowed_origins = AllowedOrigins::parse(
            &lookup("ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
        );

        Ok(Self {
            bind_addr,
            workbook_path,
            log_dir,
            allowed_origins,
        })
    }
}
