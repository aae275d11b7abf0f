use anyhow::Context;
use flowcore::DocumentFormat;
use std::path::PathBuf;

/// Server settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Directory of flow documents; flows live in memory when unset.
    pub flow_dir: Option<PathBuf>,
    pub format: DocumentFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            flow_dir: None,
            format: DocumentFormat::Json,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let format = match var("FLOW_FORMAT") {
            Some(format) => format
                .parse()
                .with_context(|| format!("FLOW_FORMAT={}", format))?,
            None => defaults.format,
        };
        Ok(Self {
            bind_address: var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            flow_dir: var("FLOW_DIR").filter(|d| !d.is_empty()).map(PathBuf::from),
            format,
        })
    }
}
