use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::TbxVersion;

/// Verbosity levels for console output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only the verdict
    Quiet,
    /// Verdict, dialect and report location
    #[default]
    Normal,
    /// Everything above plus each diagnostic
    Verbose,
}

/// Log level accepted by `--log-level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Validate TBX terminology files against their dialect's RELAX NG grammar and Schematron rules
#[derive(Parser, Debug, Clone)]
#[command(name = "tbx-check")]
#[command(about = "Detect the dialect of a TBX file and validate it against the matching RNG and SCH files")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the built-in dialect schema folders
    #[arg(long = "schema-dir", global = true)]
    pub schema_dir: Option<PathBuf>,

    /// Directory searched for custom dialect schemas
    #[arg(long = "external-dir", global = true)]
    pub external_dir: Option<PathBuf>,

    /// Log level for diagnostics written to stderr
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Only print the verdict
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a TBX document and write a results file
    Validate(ValidateArgs),

    /// Install a custom dialect grammar (.rng) or rule-set (.sch)
    Import {
        /// File whose name contains _TBX-<dialect>_
        schema_file: PathBuf,
    },

    /// Download the built-in dialect schemas from upstream
    Sync,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// The .tbx or .xml file to validate
    pub file: PathBuf,

    /// TBX major version (2 uses the DTD validator)
    #[arg(long = "tbx-version")]
    pub tbx_version: Option<TbxVersion>,

    /// Skip the xml:lang check (TBX v2 only)
    #[arg(long = "no-lang-check")]
    pub no_lang_check: bool,

    /// Keep scanning when a custom dialect's files are missing
    #[arg(long = "continue-scan")]
    pub continue_scan: bool,

    /// Directory the results file is written to
    #[arg(long = "report-dir")]
    pub report_dir: Option<PathBuf>,

    /// Open the results file when done
    #[arg(long = "open")]
    pub open: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Explicit log filter requested on the command line, if any
    pub fn log_directive(&self) -> Option<&'static str> {
        if let Some(level) = self.log_level {
            Some(level.as_directive())
        } else if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("error")
        } else {
            None
        }
    }

    pub fn validate_args(&self) -> Option<&ValidateArgs> {
        match &self.command {
            Command::Validate(args) => Some(args),
            _ => None,
        }
    }
}
