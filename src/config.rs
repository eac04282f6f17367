use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "snippetd", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub judge: JudgeConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    pub languages: Vec<LanguageConfig>,
}

#[derive(Deserialize, Debug)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

/// Connection settings for the remote judge service.
#[derive(Deserialize, Debug, Clone)]
pub struct JudgeConfig {
    /// Base URL of the judge API, without a trailing slash
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,
}

fn default_poll_interval_ms() -> u64 {
    400
}

fn default_submit_attempts() -> u32 {
    2
}

/// Bounds on per-run time budgets.
///
/// The default applies when a request omits its limit; the ceiling caps
/// worst-case resource usage no matter what the caller asks for.
#[derive(Deserialize, Debug, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_time_limit_ms")]
    pub default_time_limit_ms: u64,
    #[serde(default = "max_time_limit_ms")]
    pub max_time_limit_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_time_limit_ms: default_time_limit_ms(),
            max_time_limit_ms: max_time_limit_ms(),
        }
    }
}

fn default_time_limit_ms() -> u64 {
    5_000
}

fn max_time_limit_ms() -> u64 {
    30_000
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LanguageConfig {
    pub name: String,
    #[serde(flatten)]
    pub backend: LanguageBackend,
}

/// Which execution backend serves a language.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum LanguageBackend {
    /// Run in a local sandboxed subprocess. `command` is a template where
    /// `%INPUT%` is replaced with the path of the written source file.
    Local { file_name: String, command: Vec<String> },
    /// Submit to the remote judge service under its numeric language id.
    Judge { language_id: u32 },
    /// Rendered by the live-preview bundler; excluded from `run` entirely.
    Preview,
}

impl LanguageConfig {
    /// Whether the dispatcher will accept this language at all.
    pub fn is_runnable(&self) -> bool {
        self.backend != LanguageBackend::Preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();

        assert_eq!(config.server.bind_address, Some("127.0.0.1".to_string()));
        assert_eq!(config.judge.base_url, "https://judge0-ce.p.rapidapi.com");
        assert_eq!(config.judge.poll_interval_ms, 400);
        assert_eq!(config.judge.submit_attempts, 2);
        assert_eq!(config.limits.default_time_limit_ms, 5_000);

        let javascript = &config.languages[0];
        assert_eq!(javascript.name, "javascript");
        assert!(matches!(
            javascript.backend,
            LanguageBackend::Local { ref command, .. } if command.contains(&"%INPUT%".to_string())
        ));

        let python = config.languages.iter().find(|l| l.name == "python").unwrap();
        assert_eq!(python.backend, LanguageBackend::Judge { language_id: 71 });

        let react = config.languages.iter().find(|l| l.name == "react").unwrap();
        assert!(!react.is_runnable());
    }
}
