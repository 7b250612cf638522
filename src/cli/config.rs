use std::path::Path;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::bridge::bridge::FallbackPolicy;
use crate::dom::builder::DocumentSpec;
use crate::dom::document::Document;
use crate::error::ConfigError;
use crate::fill::fill_model::FillOptions;
use crate::model::watcher::DEFAULT_DEBOUNCE;
use crate::scanner::scanner::ScanOptions;
use crate::validation::result::ValidationOptions;

pub const DEFAULT_CONFIG_PATH: &str = "form-intelligence.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "form-intelligence",
    version,
    about = "Extract, fill and validate forms in a document"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: form-intelligence.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a document and print its forms
    Scan {
        /// Document file (JSON or YAML)
        #[arg(long)]
        document: String,

        /// Output format: console, json
        #[arg(long, default_value = "console")]
        format: String,
    },

    /// Apply values to a document
    Fill {
        /// Document file (JSON or YAML)
        #[arg(long)]
        document: String,

        /// Values file: identifier to value map (JSON or YAML)
        #[arg(long)]
        values: String,

        /// Retry failures against fuzzy-matched alternates
        #[arg(long)]
        smart: bool,

        /// Validate every filled element
        #[arg(long)]
        validate: bool,

        /// Output format: console, json
        #[arg(long, default_value = "console")]
        format: String,
    },

    /// Validate every form in a document
    Validate {
        /// Document file (JSON or YAML)
        #[arg(long)]
        document: String,

        /// Output format: console, json
        #[arg(long, default_value = "console")]
        format: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `form-intelligence.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scan: ScanOptions,
    #[serde(default)]
    pub fill: FillOptions,
    #[serde(default)]
    pub validation: ValidationOptions,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSONL file receiving one line per application attempt.
    pub path: Option<String>,
}

fn default_debounce_ms() -> u64 { DEFAULT_DEBOUNCE.as_millis() as u64 }

// ============================================================================
// File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

fn read_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })
}

fn is_json(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Build a document from a JSON (`.json`) or YAML file.
pub fn load_document(path: &str) -> Result<Document, ConfigError> {
    let raw = read_file(path)?;
    let spec = if is_json(path) {
        DocumentSpec::from_json(&raw)
    } else {
        DocumentSpec::from_yaml(&raw)
    };
    spec.and_then(|s| s.build()).map_err(|e| ConfigError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Read an identifier-to-value map from a JSON or YAML file.
pub fn load_values(path: &str) -> Result<crate::fill::fill_model::FillValues, ConfigError> {
    let raw = read_file(path)?;
    let parsed = if is_json(path) {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_string(),
        reason,
    })
}
