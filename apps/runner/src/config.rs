use std::{env, fmt, fs, io, path};

use scout::EndpointConfig;
use scout::monitoring::DEFAULT_OUTCOME_BUFFER;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read {path}: {source}")]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write {path}: {source}")]
    WriteFailed {
        path: path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse {path}: {message}")]
    ParseFailed { path: path::PathBuf, message: String },

    #[error("could not serialize config: {0}")]
    SerializeFailed(String),

    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

impl Format {
    fn of(path: &path::Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Outcomes buffered before endpoint loops wait for the reporter
    #[serde(default = "default_outcome_buffer")]
    pub outcome_buffer: usize,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

fn default_outcome_buffer() -> usize {
    DEFAULT_OUTCOME_BUFFER
}

/// Keep `.json` files as they are, read everything else as toml
fn normalize_config_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if Format::of(&path) == Format::Toml && path.extension().is_none_or(|ext| ext != "toml") {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/scout/endpoints.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("scout/endpoints.toml"))
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            outcome_buffer: DEFAULT_OUTCOME_BUFFER,
            endpoints: vec![EndpointConfig::http("https://example.com").with_name("example")],
        }
    }
}

impl fmt::Display for RunnerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Scout Runner Configuration:")?;
        write_1(f, "Outcome Buffer", &self.outcome_buffer)?;
        write_title_1(f, "Endpoints")?;
        for endpoint in &self.endpoints {
            write_1(f, endpoint.display_name(), &endpoint.protocol)?;
            write_2(f, "Id", &endpoint.id)?;
            write_2(f, "Address", &endpoint.address)?;
            if let Some(port) = endpoint.port {
                write_2(f, "Port", &port)?;
            }
            write_2(f, "Interval", &scout::duration::format(endpoint.interval))?;
            if endpoint.retry.enabled {
                write_2(f, "Retry Max", &endpoint.retry.max_attempts)?;
            }
        }

        Ok(())
    }
}

impl RunnerConfig {
    /// Load the endpoint list from file
    ///
    /// Creates a default config in ~/.config/scout/endpoints.toml
    ///  or the specified path if none exists yet
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_config_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Self::parse(&raw_string, Format::of(&config_path))
                .map_err(|message| Error::ParseFailed { path: config_path, message })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    fn parse(raw: &str, format: Format) -> Result<Self, String> {
        match format {
            Format::Toml => toml::from_str(raw).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str = match Format::of(path) {
            Format::Toml => toml::to_string_pretty(self).map_err(|e| Error::SerializeFailed(e.to_string()))?,
            Format::Json => {
                serde_json::to_string_pretty(self).map_err(|e| Error::SerializeFailed(e.to_string()))?
            }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}
