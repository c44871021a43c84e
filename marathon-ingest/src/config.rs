//! Service configuration
//!
//! Priority per setting: command line → environment → TOML → default.
//! Command line and environment are merged by clap.

use clap::Parser;
use marathon_common::config::{
    default_config_path, load_toml_config, resolve_root_folder, LoggingConfig,
    DATABASE_FILE_NAME, UPLOADS_DIR_NAME,
};
use marathon_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::PipelinePolicy;

pub const SERVICE_NAME: &str = "marathon-ingest";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";
pub const ROOT_FOLDER_ENV: &str = "MARATHON_ROOT";

/// Command-line arguments
#[derive(Debug, Default, Parser)]
#[command(name = "marathon-ingest", version, about = "Marathon results ingestion service")]
pub struct Args {
    /// TOML configuration file
    #[arg(long, env = "MARATHON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Folder holding the database and uploads
    #[arg(long, env = "MARATHON_ROOT")]
    pub root_folder: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:5780
    #[arg(long, env = "MARATHON_BIND")]
    pub bind: Option<String>,

    /// Default log level (RUST_LOG overrides)
    #[arg(long, env = "MARATHON_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// TOML file layout
#[derive(Debug, Default, Deserialize)]
pub struct IngestToml {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub pipeline: PipelinePolicy,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub log_level: String,
    pub policy: PipelinePolicy,
}

impl IngestConfig {
    /// Merge arguments with the TOML file (explicit path or default location)
    pub fn resolve(args: &Args) -> Result<Self> {
        let toml_path = args
            .config
            .clone()
            .or_else(|| default_config_path(SERVICE_NAME));

        let toml = match toml_path.as_deref() {
            Some(path) => {
                let loaded = load_toml_config::<IngestToml>(path)?;
                match loaded {
                    Some(toml) => {
                        info!("Loaded configuration from {}", path.display());
                        toml
                    }
                    None if args.config.is_some() => {
                        return Err(Error::Config(format!(
                            "Config file not found: {}",
                            path.display()
                        )));
                    }
                    None => IngestToml::default(),
                }
            }
            None => IngestToml::default(),
        };

        Self::from_parts(args, toml)
    }

    /// Apply priority rules to already-loaded inputs
    pub fn from_parts(args: &Args, toml: IngestToml) -> Result<Self> {
        toml.pipeline
            .validate()
            .map_err(|e| Error::Config(format!("Invalid [pipeline] settings: {}", e)))?;

        let root_folder = resolve_root_folder(
            args.root_folder.as_deref(),
            ROOT_FOLDER_ENV,
            toml.root_folder.as_deref(),
        );

        let bind_address = args
            .bind
            .clone()
            .or(toml.bind_address)
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let log_level = args.log_level.clone().unwrap_or(toml.logging.level);

        Ok(Self {
            root_folder,
            bind_address,
            log_level,
            policy: toml.pipeline,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root_folder.join(UPLOADS_DIR_NAME)
    }

    pub fn root(&self) -> &Path {
        &self.root_folder
    }
}
