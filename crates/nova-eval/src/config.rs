//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! evaluation_timeout_ms = 2000
//! ellipsis_length = 60
//! allow_to_string_calls = false
//!
//! [logging]
//! level = "nova.eval=debug"
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Once,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// How long a call into the debuggee may run before it is aborted.
    pub evaluation_timeout_ms: u64,
    /// How long an aborted call is waited for before the engine gives up on it.
    pub abort_grace_ms: u64,
    pub ellipsize_strings: bool,
    /// Maximum number of characters shown for string values.
    pub ellipsis_length: usize,
    pub ellipsis_marker: String,
    pub allow_target_invoke: bool,
    /// Call user `ToString` overrides when rendering objects.
    pub allow_to_string_calls: bool,
    pub case_sensitive: bool,
    /// Naming conventions of the compilers whose output may be debugged.
    pub conventions: Vec<CompilerConventions>,
    pub logging: LoggingConfig,
}

impl EvalConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn abort_grace(&self) -> Duration {
        Duration::from_millis(self.abort_grace_ms)
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            evaluation_timeout_ms: 1_000,
            abort_grace_ms: 500,
            ellipsize_strings: true,
            ellipsis_length: 100,
            ellipsis_marker: "...".to_string(),
            allow_target_invoke: true,
            allow_to_string_calls: true,
            case_sensitive: true,
            conventions: CompilerConventions::defaults(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Name fragments one compiler family uses for the types and fields it
/// synthesizes when lowering closures and iterators.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConventions {
    pub family: String,
    /// Substrings identifying a generated closure ("display class") type.
    pub closure_type_markers: Vec<String>,
    /// Substrings identifying a generated iterator / state machine type.
    pub iterator_type_markers: Vec<String>,
    /// Exact names of the field holding the captured `this`.
    pub hoisted_this_fields: Vec<String>,
    /// Prefixes of fields pointing at an enclosing closure instance.
    pub closure_ref_prefixes: Vec<String>,
    /// A hoisted local is named `{open}{name}{close}...`.
    pub hoisted_local_open: String,
    pub hoisted_local_close: String,
    /// Fields containing this marker are compiler bookkeeping and never shown.
    pub internal_marker: String,
    /// Prefixes of locals (in ordinary frames) holding a closure instance.
    pub closure_local_prefixes: Vec<String>,
}

impl CompilerConventions {
    pub fn defaults() -> Vec<Self> {
        vec![Self::roslyn(), Self::mcs()]
    }

    pub fn roslyn() -> Self {
        Self {
            family: "roslyn".to_string(),
            closure_type_markers: strings(&["<>c__DisplayClass"]),
            iterator_type_markers: strings(&[">d__"]),
            hoisted_this_fields: strings(&["<>4__this"]),
            closure_ref_prefixes: strings(&["CS$<>8__locals", "<>8__locals"]),
            hoisted_local_open: "<".to_string(),
            hoisted_local_close: ">5__".to_string(),
            internal_marker: "<>".to_string(),
            closure_local_prefixes: strings(&["CS$<>8__locals", "<>8__locals"]),
        }
    }

    pub fn mcs() -> Self {
        Self {
            family: "mcs".to_string(),
            closure_type_markers: strings(&["c__AnonStorey"]),
            iterator_type_markers: strings(&["c__Iterator"]),
            hoisted_this_fields: strings(&["<>f__this", "$this"]),
            closure_ref_prefixes: strings(&["<>f__ref$"]),
            hoisted_local_open: "<".to_string(),
            hoisted_local_close: ">__".to_string(),
            internal_marker: "$".to_string(),
            closure_local_prefixes: strings(&["$locvar"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Either a simple level (`info`, `debug`, ...) or an `EnvFilter`
    /// directive string.
    pub level: String,
    /// Emit logs as JSON lines.
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: configured directives, refined by `RUST_LOG`.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs a global `tracing` subscriber writing to stderr.
///
/// Only the first call has an effect; a subscriber installed by the host
/// process beforehand is left alone.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(config.env_filter())
            .with_writer(std::io::stderr);
        let _ = if config.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
    });
}
