use crate::cli::{Cli, Command, VerbosityLevel};
use crate::dialect::SchemaLayout;
use crate::http_client::HttpClientConfig;
use crate::pipeline::{PipelineConfig, TbxVersion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Prefix of every environment variable the checker reads
pub const ENV_PREFIX: &str = "TBX_CHECK_";

const CONFIG_NAMES: [&str; 4] = [
    "tbx-check.toml",
    "tbx-check.json",
    ".tbx-check.toml",
    ".tbx-check.json",
];

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub schemas: SchemaConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub network: NetworkConfig,
}

/// Where grammar and rule-set files are found
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Root holding the `TBX-*_dialect-master` folders
    pub root: PathBuf,
    /// Custom dialect lookup directory, `<root>/External_Schemas` when unset
    pub external_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub tbx_version: TbxVersion,
    /// Check xml:lang values (TBX v2)
    pub check_xml_lang: bool,
    /// Keep scanning past custom dialect markers whose files are missing
    pub continue_scan_on_unresolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory results files are written to
    pub report_dir: PathBuf,
    /// Open the results file after writing it
    pub open_report: bool,
    pub verbose: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed downloads
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            external_dir: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tbx_version: TbxVersion::V3,
            check_xml_lang: true,
            continue_scan_on_unresolved: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("."),
            open_report: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Config {
    pub fn schema_layout(&self) -> SchemaLayout {
        let layout = SchemaLayout::new(&self.schemas.root);
        match &self.schemas.external_dir {
            Some(dir) => layout.with_external_dir(dir),
            None => layout,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            version: self.validation.tbx_version,
            layout: self.schema_layout(),
            check_xml_lang: self.validation.check_xml_lang,
            continue_scan_on_unresolved: self.validation.continue_scan_on_unresolved,
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout_seconds: self.network.timeout_seconds,
            retry_attempts: self.network.retry_attempts,
            retry_delay_ms: self.network.retry_delay_ms,
            ..Default::default()
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON); missing keys keep their defaults
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find a configuration file in the working directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let mut candidates: Vec<PathBuf> = CONFIG_NAMES.iter().map(PathBuf::from).collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_dir = config_dir.join("tbx-check");
            candidates.extend(CONFIG_NAMES.iter().map(|name| app_dir.join(name)));
        }

        for path in candidates {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::debug!(path = %path.display(), "using configuration file");
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        Ok(None)
    }

    /// Apply `TBX_CHECK_*` overrides from the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply `TBX_CHECK_*` overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(root) = env.get("TBX_CHECK_SCHEMA_DIR") {
            config.schemas.root = PathBuf::from(root);
        }
        if let Some(dir) = env.get("TBX_CHECK_EXTERNAL_DIR") {
            config.schemas.external_dir = Some(PathBuf::from(dir));
        }

        if let Some(version) = parse_env(env, "TBX_CHECK_TBX_VERSION")? {
            config.validation.tbx_version = version;
        }
        if let Some(check) = parse_env(env, "TBX_CHECK_LANG_CHECK")? {
            config.validation.check_xml_lang = check;
        }
        if let Some(continue_scan) = parse_env(env, "TBX_CHECK_CONTINUE_SCAN")? {
            config.validation.continue_scan_on_unresolved = continue_scan;
        }

        if let Some(dir) = env.get("TBX_CHECK_REPORT_DIR") {
            config.output.report_dir = PathBuf::from(dir);
        }
        if let Some(open) = parse_env(env, "TBX_CHECK_OPEN_REPORT")? {
            config.output.open_report = open;
        }
        if let Some(verbose) = parse_env(env, "TBX_CHECK_VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = parse_env(env, "TBX_CHECK_QUIET")? {
            config.output.quiet = quiet;
        }

        if let Some(timeout) = parse_env(env, "TBX_CHECK_TIMEOUT")? {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = parse_env(env, "TBX_CHECK_RETRY_ATTEMPTS")? {
            config.network.retry_attempts = retry_attempts;
        }
        if let Some(delay) = parse_env(env, "TBX_CHECK_RETRY_DELAY_MS")? {
            config.network.retry_delay_ms = delay;
        }

        Ok(config)
    }

    /// Apply the flags actually given on the command line
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(root) = &cli.schema_dir {
            config.schemas.root = root.clone();
        }
        if let Some(dir) = &cli.external_dir {
            config.schemas.external_dir = Some(dir.clone());
        }

        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        if let Command::Validate(args) = &cli.command {
            if let Some(version) = args.tbx_version {
                config.validation.tbx_version = version;
            }
            if args.no_lang_check {
                config.validation.check_xml_lang = false;
            }
            if args.continue_scan {
                config.validation.continue_scan_on_unresolved = true;
            }
            if let Some(dir) = &args.report_dir {
                config.output.report_dir = dir.clone();
            }
            if args.open {
                config.output.open_report = true;
            }
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.schemas.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Schema root must not be empty".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, key: &str) -> Result<Option<T>> {
    match env.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, raw))),
    }
}
